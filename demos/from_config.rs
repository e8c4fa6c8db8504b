use logspool::{LogSpoolBuilder, LogSpoolConfig};

const CONFIG: &str = r#"{
    "path": "./logs",
    "fileName": "service.log",
    "sizeThreshold": 1048576,
    "dailyRotation": true,
    "compress": true
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config: LogSpoolConfig = serde_json::from_str(CONFIG)?;
    let spool = LogSpoolBuilder::from_config(&config).build()?;

    spool.append(b"service configured from a config record\n");
    spool.shutdown()?;
    Ok(())
}
