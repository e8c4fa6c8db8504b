use {
    logspool::{LogSpoolBuilder, RotationSize},
    tracing_subscriber::util::SubscriberInitExt,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spool = LogSpoolBuilder::new()
        .directory("./logs")
        .file_name("tracing.log")
        .size_threshold(RotationSize::MB(10))
        .daily_rotation(true)
        .compress(true)
        .build()?;
    let mut drain = spool.writer();
    tracing_subscriber::fmt()
        .with_writer(spool)
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish()
        .try_init()?;

    tracing::info!("This is an info message");
    tracing::warn!("This is a warning message");
    tracing::error!("This is an error message");

    // Messages still queued at exit would be lost.
    std::io::Write::flush(&mut drain)?;
    Ok(())
}
