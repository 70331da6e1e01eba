use crate::error::RemError;
use gdal::Dataset;
use std::path::Path;

pub trait DatasetEx {
    fn open_dataset(path: impl AsRef<Path>) -> Result<Dataset, RemError>;
}

impl DatasetEx for Dataset {
    fn open_dataset(path: impl AsRef<Path>) -> Result<Dataset, RemError> {
        let path = path.as_ref();
        Dataset::open(path).map_err(RemError::from)
    }
}
