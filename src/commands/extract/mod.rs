use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use regex::Regex;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cli::{ExtractArgs, InputFormat};
use crate::commands::inventory;
use crate::model::{
    DocumentSummary, ExtractCounts, ExtractPaths, ExtractRunManifest, OrphanDiscount,
    PriceListEntry, PriceListInventoryManifest, ToolVersions, UnmatchedItemLine,
};
use crate::util::{
    ensure_directory, now_utc_string, read_json, utc_compact_string, write_json_pretty,
    write_text,
};

const DB_SCHEMA_VERSION: &str = "0.1.0";

mod calibration;
mod export;
mod fragments;
mod item_grammar;
mod line_assembly;
mod line_classifier;
mod name_resolution;
mod pipeline;
mod record_stitcher;
mod record_store;
mod run;
#[cfg(test)]
mod tests;

pub use run::run;

pub(crate) use calibration::Calibration;
pub(crate) use fragments::{DocumentFormat, load_document_pages};
pub(crate) use line_classifier::{ClassifiedLine, LineClassifier};
pub(crate) use pipeline::{classify_document, render_classified_line};
pub(crate) use run::LATEST_EXTRACT_MANIFEST;
#[cfg(test)]
use run::render_extract_command;

use export::*;
use fragments::*;
use item_grammar::*;
use line_assembly::*;
use line_classifier::*;
use name_resolution::*;
use pipeline::*;
use record_stitcher::*;
use record_store::*;
