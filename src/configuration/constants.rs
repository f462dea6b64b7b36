pub mod cargo_env {
    pub const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
}

pub mod common {
    pub const ENV_PREFIX: &str = "DOCPROBE";
    pub const DEFAULT_DATABASE_URI: &str = "memory://qa";
    pub const DEFAULT_REPORTS_DIR: &str = "reports";
    pub const DEFAULT_WORKERS: usize = 16;
    pub const MAX_WORKERS: usize = 64;
    pub const DEFAULT_UNIT_TIMEOUT_SECS: u64 = 30;
}

pub mod exit_code {
    pub const PASSED: i32 = 0;
    pub const FAILED: i32 = 1;
    pub const MISCONFIGURED: i32 = 2;
}
