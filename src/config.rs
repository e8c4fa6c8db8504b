use {serde::Deserialize, std::path::PathBuf};

/// Declarative spool settings, as found under a `log` key of a service
/// configuration file.
///
/// Every key is optional and uses camelCase:
///
/// ```yaml
/// log:
///   path: /var/log/orders
///   fileName: orders.log
///   sizeThreshold: 104857600
///   dailyRotation: true
///   compress: true
/// ```
///
/// Unknown keys are rejected. Older service configs carried `fileSize` in
/// megabytes and a `level`; these must be migrated to `sizeThreshold` in bytes
/// (levels belong to the subscriber's filter) rather than silently ignored.
///
/// Feed it to [`LogSpoolBuilder::from_config`](crate::LogSpoolBuilder::from_config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct LogSpoolConfig {
    /// Directory of the active file.
    pub path: Option<PathBuf>,
    /// Base name of the active file.
    pub file_name: Option<String>,
    /// Size in bytes at which the active file is rotated. 0 disables it.
    pub size_threshold: Option<u64>,
    pub daily_rotation: bool,
    /// Gzip rotated files.
    pub compress: bool,
    pub max_keep_files: Option<u64>,
    /// Unix permission bits. Most formats lack octal literals, so `0o644` is
    /// written as `420`.
    pub file_mode: Option<u32>,
}
