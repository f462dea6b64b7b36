use crate::app::error::Error;
use crate::configuration::settings::SetupSettings;
use crate::connection::pool::SessionPool;
use crate::connection::Document;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

type Dataset = BTreeMap<String, Vec<Document>>;

/// Verifies the database answers and seeds the optional dataset. Any failure
/// here aborts the run before a unit executes.
pub fn prepare(pool: &SessionPool, settings: &SetupSettings) -> Result<(), Error> {
    let session = pool.dedicated()?;
    if settings.skip_ping {
        debug!("Skipping the connectivity check");
    } else {
        session.ping()?;
        info!("Database is reachable");
    }
    if let Some(path) = &settings.dataset {
        for (collection, documents) in read_dataset(path)? {
            let loaded = documents.len();
            session.insert_many(&collection, documents)?;
            info!("Loaded {} documents into '{}'", loaded, collection);
        }
    }
    Ok(())
}

fn read_dataset(path: &Path) -> Result<Dataset, Error> {
    let file = File::open(path)
        .map_err(|e| Error::Setup(format!("cannot open dataset {}: {}", path.display(), e)))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Setup(format!("dataset {} is not valid: {}", path.display(), e)))
}
