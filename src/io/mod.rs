//! Reading and writing of `symblock` configuration files.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{self, format_err};
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml;

pub mod format;


/// Reads a `symblock` configuration YAML file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (with its `.yml` or `.yaml` extension).
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_symblock_yaml<T, P: AsRef<Path>>(name: P) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let mut reader = BufReader::new(File::open(name).map_err(|err| format_err!(err))?);
    serde_yaml::from_reader(&mut reader).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into a `symblock` configuration YAML file.
///
/// # Arguments
///
/// * `name` - The name of the YAML file to be written (without extensions). The resulting file
/// will have the `.yml` extension.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_symblock_yaml<T, P: AsRef<Path>>(name: P, value: &T) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let mut path = name.as_ref().to_path_buf();
    path.set_extension("yml");
    let mut writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(&mut writer, value).map_err(|err| format_err!(err))
}
