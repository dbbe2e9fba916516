//! Built-in telescope schemas
//!
//! Every hpdaq deployment publishes the GUPPI RAW header keys plus its own
//! pipeline keys; the `TELESCOP` value tells them apart.

use crate::map::StatusMap;
use crate::schema::{Accessor, Discriminator, SchemaDescriptor};
use crate::value::ValueKind::{Float, Int, Str};

fn telescope(map: &StatusMap) -> Option<String> {
    map.get("TELESCOP")?.as_str().map(str::to_string)
}

/// Selects schemas by the `TELESCOP` string
pub const TELESCOPE: Discriminator = Discriminator {
    name: "telescope",
    extract: telescope,
};

/// GUPPI RAW header keys
pub const GUPPI_RAW: &[Accessor] = &[
    Accessor::new("telescope", "TELESCOP", Str),
    Accessor::new("backend", "BACKEND", Str),
    Accessor::new("src_name", "SRC_NAME", Str),
    Accessor::new("ra_str", "RA_STR", Str),
    Accessor::new("dec_str", "DEC_STR", Str),
    Accessor::new("obsfreq", "OBSFREQ", Float),
    Accessor::new("obsbw", "OBSBW", Float),
    Accessor::new("obsnchan", "OBSNCHAN", Int),
    Accessor::new("npol", "NPOL", Int),
    Accessor::new("nbits", "NBITS", Int),
    Accessor::new("tbin", "TBIN", Float),
    Accessor::new("blocsize", "BLOCSIZE", Int),
    Accessor::new("directio", "DIRECTIO", Int),
    Accessor::new("pktidx", "PKTIDX", Int),
    Accessor::new("piperblk", "PIPERBLK", Int),
    Accessor::new("synctime", "SYNCTIME", Int),
];

/// Keys every hpdaq pipeline publishes
pub const HPDAQ: &[Accessor] = &[
    Accessor::new("daqstate", "DAQSTATE", Str),
    Accessor::new("netstat", "NETSTAT", Str),
    Accessor::new("datadir", "DATADIR", Str),
    Accessor::new("projid", "PROJID", Str),
    Accessor::new("pulse", "PULSE", Int),
    Accessor::new("pktstart", "PKTSTART", Int),
    Accessor::new("pktstop", "PKTSTOP", Int),
    Accessor::new("bindhost", "BINDHOST", Str),
    Accessor::new("bindport", "BINDPORT", Int),
];

const ATA_KEYS: &[Accessor] = &[
    Accessor::new("nants", "NANTS", Int),
    Accessor::new("schan", "SCHAN", Int),
    Accessor::new("fenchan", "FENCHAN", Int),
    Accessor::new("antnames", "ANTNMS00", Str),
];

const COSMIC_KEYS: &[Accessor] = &[
    Accessor::new("nants", "NANTS", Int),
    Accessor::new("schan", "SCHAN", Int),
    Accessor::new("chan_bw", "CHAN_BW", Float),
    Accessor::new("obsid", "OBSID", Str),
];

const MEERKAT_KEYS: &[Accessor] = &[
    Accessor::new("nants", "NANTS", Int),
    Accessor::new("schan", "SCHAN", Int),
    Accessor::new("fecenter", "FECENTER", Float),
    Accessor::new("subarray", "SUBARRAY", Str),
];

pub static ATA: SchemaDescriptor = SchemaDescriptor {
    name: "ata",
    discriminator_value: "ATA",
    accessors: &[HPDAQ, ATA_KEYS, GUPPI_RAW],
};

pub static COSMIC: SchemaDescriptor = SchemaDescriptor {
    name: "cosmic",
    discriminator_value: "VLA",
    accessors: &[HPDAQ, COSMIC_KEYS, GUPPI_RAW],
};

pub static MEERKAT: SchemaDescriptor = SchemaDescriptor {
    name: "meerkat",
    discriminator_value: "MeerKAT",
    accessors: &[HPDAQ, MEERKAT_KEYS, GUPPI_RAW],
};

pub static SCHEMAS: &[&SchemaDescriptor] = &[&ATA, &COSMIC, &MEERKAT];
