pub mod assembler;
pub mod cli;
pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod fastq;
pub mod fs_util;
pub mod local;
pub mod logging;
pub mod object_store;
pub mod output;
pub mod pipeline;
pub mod remote;
pub mod resolver;
pub mod sra;
pub mod workdir;
