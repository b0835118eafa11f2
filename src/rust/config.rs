// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::Fail,
    tcp::reassembly::ReassemblyConfig,
};
use ::std::{
    fs::File,
    io::Read,
    ops::Index,
    str::FromStr,
};
use ::yaml_rust::{
    Yaml,
    YamlLoader,
};

//======================================================================================================================
// Constants
//======================================================================================================================

// Reassembly-engine options. Every key may be overridden through an upper-cased environment variable of the same name
// and may be omitted from the file, in which case built-in defaults apply.
mod reassembly_config {
    pub const SECTION_NAME: &str = "reassembly";
    pub const NETWORK_BUFFER_COUNT: &str = "network_buffer_count";
    pub const MAX_QUEUED_SEGMENTS: &str = "max_queued_segments";
    pub const MAX_SEGMENTS_PER_QUEUE: &str = "max_segments_per_queue";
    pub const POOL_CAPACITY: &str = "descriptor_pool_capacity";
}

//======================================================================================================================
// Structures
//======================================================================================================================

/// Stack configuration, backed by a YAML document.
#[derive(Clone, Debug)]
pub struct Config(pub Yaml);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Config {
    /// Reads a configuration file into a [Config] object.
    pub fn new(config_path: String) -> Result<Self, Fail> {
        let mut config_s: String = String::new();
        let mut file: File = File::open(&config_path)?;
        file.read_to_string(&mut config_s)?;
        let config: Vec<Yaml> = match YamlLoader::load_from_str(&config_s) {
            Ok(config) => config,
            Err(e) => {
                let cause: String = format!("failed to parse configuration file: {:?}", e);
                error!("new(): {}", cause);
                return Err(Fail::new(libc::EINVAL, &cause));
            },
        };
        let config_obj: &Yaml = match &config[..] {
            [c] => c,
            _ => return Err(Fail::new(libc::EINVAL, "wrong number of config objects")),
        };

        Ok(Self(config_obj.clone()))
    }

    /// Assembles the reassembly-engine configuration from the `reassembly` section.
    pub fn reassembly_config(&self) -> Result<ReassemblyConfig, Fail> {
        let network_buffer_count: Option<usize> = self.get_reassembly_option(reassembly_config::NETWORK_BUFFER_COUNT)?;
        let max_queued_segments: Option<usize> = self.get_reassembly_option(reassembly_config::MAX_QUEUED_SEGMENTS)?;
        let max_segments_per_queue: Option<usize> =
            self.get_reassembly_option(reassembly_config::MAX_SEGMENTS_PER_QUEUE)?;
        let pool_capacity: Option<usize> = self.get_reassembly_option(reassembly_config::POOL_CAPACITY)?;

        Ok(ReassemblyConfig::new(
            network_buffer_count,
            max_queued_segments,
            max_segments_per_queue,
            pool_capacity,
        ))
    }

    /// Looks an integer option up in the `reassembly` section, checking the environment first. Missing keys (and a
    /// missing section) resolve to `None`; present keys of the wrong type are an error.
    fn get_reassembly_option<T: TryFrom<i64> + FromStr>(&self, index: &str) -> Result<Option<T>, Fail> {
        if let Some(value) = Self::get_typed_env_option(index)? {
            return Ok(Some(value));
        }
        let section: &Yaml = match Self::get_subsection(&self.0, reassembly_config::SECTION_NAME) {
            Ok(section) => section,
            Err(_) => return Ok(None),
        };
        match section.index(index) {
            Yaml::BadValue => Ok(None),
            value => match value.as_i64() {
                Some(value) => match T::try_from(value) {
                    Ok(value) => Ok(Some(value)),
                    _ => {
                        let message: String = format!("parameter \"{}\" is out of range", index);
                        Err(Fail::new(libc::ERANGE, message.as_str()))
                    },
                },
                None => {
                    let message: String = format!("parameter \"{}\" has unexpected type", index);
                    Err(Fail::new(libc::EINVAL, message.as_str()))
                },
            },
        }
    }

    /// Index `yaml` to find the value at `index`, validating that it names a subsection.
    fn get_subsection<'a>(yaml: &'a Yaml, index: &str) -> Result<&'a Yaml, Fail> {
        match yaml.index(index) {
            section @ Yaml::Hash(_) => Ok(section),
            Yaml::BadValue => {
                let message: String = format!("missing configuration section \"{}\"", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
            _ => {
                let message: String = format!("section \"{}\" has unexpected type", index);
                Err(Fail::new(libc::EINVAL, message.as_str()))
            },
        }
    }

    /// Gets a value from the environment, which overrides the config file when set.
    fn get_typed_env_option<T: FromStr>(index: &str) -> Result<Option<T>, Fail> {
        if let Ok(var) = ::std::env::var(index.to_uppercase()) {
            if let Ok(value) = var.as_str().parse() {
                return Ok(Some(value));
            }
            let message: String = format!("parameter \"{}\" has unexpected type", index);
            return Err(Fail::new(libc::EINVAL, message.as_str()));
        }
        Ok(None)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
