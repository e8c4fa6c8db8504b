use {
    logspool::{LogSpoolBuilder, RotationSize},
    std::{io::Write, time::Instant},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut logger = LogSpoolBuilder::new()
        .directory("./logs")
        .file_name("sized.log")
        .size_threshold(RotationSize::KB(256))
        .max_keep_files(5)
        .file_mode(0o640)
        .build()?;

    for i in 1..=20_000 {
        logger.write_all(
            format!("Log entry #{i}: This is a sample log message that will contribute to file size\n").as_bytes(),
        )?;
    }
    logger.shutdown()?;
    println!("Done logging: {:?}", start.elapsed());
    Ok(())
}
