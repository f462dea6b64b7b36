use crate::app::error::Error;
use crate::app::unit::Category;
use crate::configuration::command_line::Opt;
use crate::configuration::constants::common::*;
use config::{Config, Environment, File};
use serde_derive::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub execution: ExecutionSettings,
    pub reports: ReportSettings,
    pub workload: Workload,
    #[serde(default)]
    pub setup: SetupSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub uri: String,
    /// Artificial latency added to every operation of the built-in store.
    #[serde(with = "crate::configuration::deserialize::duration")]
    pub latency: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    pub workers: usize,
    #[serde(with = "crate::configuration::deserialize::duration")]
    pub unit_timeout: Duration,
    /// Category order used when every suite is selected.
    pub order: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    pub dir: PathBuf,
    pub pretty: bool,
}

/// Sizing knobs handed to unit bodies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workload {
    /// Documents generated by bulk and data-quality units.
    pub documents: usize,
    /// Repetitions of each measured query.
    pub iterations: usize,
    /// Operations issued by each simulated client.
    pub operations: usize,
    /// Number of concurrent client units in the performance suite.
    pub clients: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetupSettings {
    #[serde(default)]
    pub skip_ping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings {
                uri: DEFAULT_DATABASE_URI.to_owned(),
                latency: Duration::default(),
            },
            execution: ExecutionSettings {
                workers: DEFAULT_WORKERS,
                unit_timeout: Duration::from_secs(DEFAULT_UNIT_TIMEOUT_SECS),
                order: Category::ALL.iter().map(|c| c.name().to_owned()).collect(),
            },
            reports: ReportSettings {
                dir: PathBuf::from(DEFAULT_REPORTS_DIR),
                pretty: true,
            },
            workload: Workload::default(),
            setup: SetupSettings::default(),
        }
    }
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            documents: 1_000,
            iterations: 50,
            operations: 50,
            clients: 8,
        }
    }
}

impl Settings {
    /// Built-in defaults, then the settings file, then `DOCPROBE_*`
    /// environment variables (`DOCPROBE_EXECUTION__WORKERS=8`), then the
    /// command line.
    pub fn load(options: &Opt) -> Result<Self, Error> {
        Self::layered(options, ENV_PREFIX)
    }

    fn layered(options: &Opt, env_prefix: &str) -> Result<Self, Error> {
        // `try_from` stores values as overrides, so the defaults go in as
        // the lowest source instead.
        let mut config = Config::new();
        config.merge(Config::try_from(&Settings::default())?)?;
        if let Some(file) = &options.config {
            config.merge(File::from(file.as_path()))?;
        }
        config.merge(Environment::with_prefix(env_prefix).separator("__"))?;
        let mut settings: Settings = config.try_into()?;
        settings.apply(options);
        settings.validate()?;
        Ok(settings)
    }

    fn apply(&mut self, options: &Opt) {
        if let Some(threads) = options.threads {
            self.execution.workers = threads;
        }
        if let Some(timeout) = options.timeout {
            self.execution.unit_timeout = timeout;
        }
        if let Some(dir) = &options.reports_dir {
            self.reports.dir = dir.clone();
        }
        if options.skip_setup {
            self.setup.skip_ping = true;
        }
        if let Some(dataset) = &options.load_data {
            self.setup.dataset = Some(dataset.clone());
        }
    }

    pub fn validate(&mut self) -> Result<(), Error> {
        if self.execution.workers == 0 {
            return Err(Error::Settings("execution.workers must be at least 1".to_owned()));
        }
        if self.execution.workers > MAX_WORKERS {
            warn!(
                "execution.workers={} exceeds the limit, using {}",
                self.execution.workers, MAX_WORKERS
            );
            self.execution.workers = MAX_WORKERS;
        }
        if self.execution.unit_timeout == Duration::default() {
            return Err(Error::Settings("execution.unit_timeout must be positive".to_owned()));
        }
        self.run_order().map(|_| ())
    }

    /// The configured order, which must name every category exactly once.
    pub fn run_order(&self) -> Result<Vec<Category>, Error> {
        let mut order = Vec::with_capacity(Category::ALL.len());
        for name in &self.execution.order {
            let category = name.parse::<Category>()?;
            if order.contains(&category) {
                return Err(Error::Settings(format!(
                    "execution.order lists '{}' more than once",
                    category
                )));
            }
            order.push(category);
        }
        if let Some(missing) = Category::ALL.iter().find(|c| !order.contains(c)) {
            return Err(Error::Settings(format!(
                "execution.order is missing '{}'",
                missing
            )));
        }
        Ok(order)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_survive_the_config_layering() {
        let settings = Settings::load(&Opt::default()).unwrap();
        assert_eq!(settings.database.uri, DEFAULT_DATABASE_URI);
        assert_eq!(settings.execution.unit_timeout, Duration::from_secs(30));
        assert_eq!(settings.run_order().unwrap(), Category::ALL.to_vec());
        assert_eq!(settings.workload, Workload::default());
        assert!(settings.setup.dataset.is_none());
    }

    #[test]
    fn test_file_and_command_line_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docprobe.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "execution": {{ "workers": 3, "unit_timeout": "5s",
                                "order": ["validation", "security", "performance", "functional"] }},
                "workload": {{ "documents": 10, "iterations": 2, "operations": 3, "clients": 2 }}
            }}"#
        )
        .unwrap();
        let options = Opt {
            config: Some(path),
            timeout: Some(Duration::from_millis(900)),
            skip_setup: true,
            ..Opt::default()
        };
        let settings = Settings::load(&options).unwrap();
        assert_eq!(settings.execution.workers, 3);
        assert_eq!(settings.execution.unit_timeout, Duration::from_millis(900));
        assert_eq!(settings.workload.clients, 2);
        assert!(settings.setup.skip_ping);
        assert_eq!(settings.run_order().unwrap()[0], Category::Validation);
    }

    #[test]
    fn test_file_then_environment_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docprobe.json");
        std::fs::write(
            &path,
            r#"{"workload": {"clients": 2}, "reports": {"dir": "elsewhere"}, "database": {"uri": "memory://from_file"}}"#,
        )
        .unwrap();
        std::env::set_var("DOCPROBELAYERING_DATABASE__URI", "memory://from_env");
        std::env::set_var("DOCPROBELAYERING_EXECUTION__WORKERS", "5");
        let options = Opt {
            config: Some(path),
            ..Opt::default()
        };
        let settings = Settings::layered(&options, "DOCPROBELAYERING").unwrap();
        std::env::remove_var("DOCPROBELAYERING_DATABASE__URI");
        std::env::remove_var("DOCPROBELAYERING_EXECUTION__WORKERS");

        assert_eq!(settings.workload.clients, 2);
        assert_eq!(settings.workload.documents, Workload::default().documents);
        assert_eq!(settings.reports.dir, PathBuf::from("elsewhere"));
        assert_eq!(settings.database.uri, "memory://from_env");
        assert_eq!(settings.execution.workers, 5);
        assert_eq!(settings.execution.unit_timeout, Duration::from_secs(DEFAULT_UNIT_TIMEOUT_SECS));
    }

    #[test]
    fn test_invalid_order_is_rejected() {
        let mut settings = Settings::default();
        settings.execution.order = vec!["functional".into(), "functional".into()];
        assert!(matches!(settings.validate(), Err(Error::Settings(_))));
        settings.execution.order = vec!["functional".into()];
        assert!(matches!(settings.validate(), Err(Error::Settings(_))));
        settings.execution.order = vec!["smoke".into()];
        assert!(matches!(settings.validate(), Err(Error::UnknownCategory(_))));
    }

    #[test]
    fn test_worker_limits() {
        let mut settings = Settings::default();
        settings.execution.workers = 500;
        settings.validate().unwrap();
        assert_eq!(settings.execution.workers, MAX_WORKERS);
        settings.execution.workers = 0;
        assert!(settings.validate().is_err());
    }
}
