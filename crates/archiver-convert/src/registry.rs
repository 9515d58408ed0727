//! Dispatches a `ConverterKind` to its converter function.

use archiver_config::ConverterKind;

use crate::generic::convert_lines;
use crate::metadata::convert_metadata;

/// Look up the converter for one `fhiclize_generate.converters` entry.
pub fn converter_for(kind: ConverterKind) -> fn(&str) -> String {
    match kind {
        ConverterKind::Metadata => convert_metadata,
        ConverterKind::Boot
        | ConverterKind::Settings
        | ConverterKind::Setup
        | ConverterKind::Environment
        | ConverterKind::Ranks
        | ConverterKind::KnownBoardreadersList => convert_lines,
    }
}

/// The output filename a converter kind produces, e.g. `boot.fcl`.
pub fn output_filename(kind: ConverterKind) -> &'static str {
    match kind {
        ConverterKind::Metadata => "metadata.fcl",
        ConverterKind::Boot => "boot.fcl",
        ConverterKind::Settings => "settings.fcl",
        ConverterKind::Setup => "setup.fcl",
        ConverterKind::Environment => "environment.fcl",
        ConverterKind::Ranks => "ranks.fcl",
        ConverterKind::KnownBoardreadersList => "known_boardreaders_list.fcl",
    }
}

/// The raw source run-record filename a converter kind reads, e.g. `boot`.
pub fn source_filename(kind: ConverterKind) -> &'static str {
    match kind {
        ConverterKind::Metadata => "metadata",
        ConverterKind::Boot => "boot",
        ConverterKind::Settings => "settings",
        ConverterKind::Setup => "setup",
        ConverterKind::Environment => "environment",
        ConverterKind::Ranks => "ranks",
        ConverterKind::KnownBoardreadersList => "known_boardreaders_list",
    }
}
