use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::finder::{Result, Tour, TourSource};

#[derive(Serialize, Deserialize)]
struct TourCache {
    tours: Vec<Tour>,
}

fn read_cache(r: impl Read) -> Result<Vec<Tour>> {
    let cache: TourCache = serde_json::from_reader(BufReader::new(r))?;
    Ok(cache.tours)
}

fn write_cache(w: impl Write, tours: &[Tour]) -> Result<()> {
    let cache = TourCache { tours: tours.to_vec() };
    serde_json::to_writer(BufWriter::new(w), &cache)?;
    Ok(())
}

/// `<cache dir>/tourfinder/tours.json`, if the platform has a cache dir.
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("tourfinder").join("tours.json"))
}

/// Remembers the last successful load and serves it when the source fails.
pub struct CachedSource<S> {
    source: S,
    path: PathBuf,
}

impl<S> CachedSource<S> {
    pub fn new(source: S, path: impl Into<PathBuf>) -> Self {
        Self { source, path: path.into() }
    }

    fn store(&self, tours: &[Tour]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_cache(File::create(&self.path)?, tours)
    }
}

impl<S: TourSource> TourSource for CachedSource<S> {
    fn title(&self) -> String {
        self.source.title()
    }

    fn load(&self) -> Result<Vec<Tour>> {
        match self.source.load() {
            Ok(tours) => {
                if let Err(err) = self.store(&tours) {
                    warn!("failed to write tour cache {:?}: {err}", self.path);
                }
                Ok(tours)
            }

            Err(err) => {
                warn!("loading tours from {} failed, trying cache: {err}", self.source.title());
                let tours = read_cache(File::open(&self.path)?)?;
                info!("loaded {} cached tours from {:?}", tours.len(), self.path);
                Ok(tours)
            }
        }
    }
}
