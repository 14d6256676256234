use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use crate::error::ArtifactError;

/// Opens an input file (trace, snapshot matrix, placement list) for one sequential pass
pub fn get_reader(file: File) -> Result<impl Read + Seek, String> {
    // Compatibility on other systems
    #[cfg(not(unix))]
    {
        use std::io::BufReader;
        const BUFFER_SIZE: usize = 64 * 4096;
        Ok(BufReader::with_capacity(BUFFER_SIZE, file))
    }
    // Memory map the file for speed on unix systems, snapshot matrices run to hundreds of MB
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        use std::io::Cursor;
        unsafe {
            let m = Mmap::map(&file).map_err(|e| format!("Couldn't memory map the file: {e}"))?;
            m.advise(Advice::Sequential).map_err(|e| format!("Failed to provide access advice to the OS, {e}"))?;
            Ok(Cursor::new(m))
        }
    }
}

/// Reads a whole text file through `get_reader`
pub fn read_to_string(path: &Path) -> Result<String, ArtifactError> {
    let io_error = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    // Empty files can't be memory mapped
    if file.metadata().map_err(io_error)?.len() == 0 {
        return Ok(String::new());
    }
    let mut reader = get_reader(file).map_err(|e| io_error(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    let mut contents = String::new();
    reader.read_to_string(&mut contents).map_err(io_error)?;
    Ok(contents)
}
