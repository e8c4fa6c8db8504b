use {
    logspool::{LogSpoolBuilder, TimeZone},
    std::{io::Write, sync::Arc, thread},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let spool = Arc::new(
        LogSpoolBuilder::new()
            .directory("./logs")
            .file_name("daily.log")
            .daily_rotation(true)
            .time_zone(TimeZone::UTC) // Rotate at UTC midnight
            .compress(true)
            .max_keep_files(7) // Keep one week of logs
            .build()?,
    );

    let workers: Vec<_> = (0..4)
        .map(|id| {
            let spool = Arc::clone(&spool);
            thread::spawn(move || {
                for n in 0..250 {
                    spool.append(format!("worker {id} handled job {n}\n").as_bytes());
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().map_err(|_| "worker panicked")?;
    }

    (&*spool).flush()?;
    Ok(())
}
