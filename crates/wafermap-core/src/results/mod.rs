//! The results container.
//!
//! A single monotonically-growing value collects everything the pipeline
//! decides: placement, addresses, routes, synapses, analog-output
//! assignments, input spike times and the reverse lookup table. It can be
//! persisted and reloaded; the file extension selects the format
//! (`.json` or `.bin`, each optionally `.gz`-compressed) and loading
//! rejects documents with unknown fields.

mod l1;
mod lookup;
mod placement;
mod synapses;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::info;

use wafermap_bio::BioNeuron;
use wafermap_chip::{AnalogOutput, ChipOnWafer, Wafer};

pub use l1::{L1Routing, L1RouteItem};
pub use lookup::LookupTable;
pub use placement::{L1AddressOnWafer, LogicalNeuron, Placement, PlacementItem};
pub use synapses::{
    ChipSynapseRouting, DriverResult, SynapseRouting, SynapseRowResult, SynapseSource,
    SynapseTargetMapping,
};

use crate::error::{MapperError, Result};

/// Hardware claimed by the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resources {
    /// The wafer module.
    pub wafer: Wafer,
    /// Chips claimed by placement, in coordinate order.
    pub allocated: Vec<ChipOnWafer>,
}

/// One analog-output assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalogOutputItem {
    /// The recorded logical neuron.
    pub logical: LogicalNeuron,
    /// The output channel on the neuron's chip.
    pub aout: AnalogOutput,
}

/// Analog-output assignments; two channels per chip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalogOutputs {
    items: Vec<AnalogOutputItem>,
}

impl AnalogOutputs {
    /// Channels per chip.
    pub const CHANNELS_PER_CHIP: u8 = 2;

    /// Reserve an output channel for `logical` on its chip.
    ///
    /// # Errors
    ///
    /// [`MapperError::OutOfResources`] when both channels of the chip are
    /// taken, or the neuron is external.
    pub fn reserve(&mut self, logical: LogicalNeuron) -> Result<AnalogOutput> {
        let chip = logical
            .chip()
            .ok_or_else(|| MapperError::out_of_resources("analog output for external neuron"))?;
        let used: Vec<u8> = self
            .items
            .iter()
            .filter(|item| item.logical.chip() == Some(chip))
            .map(|item| item.aout.0)
            .collect();
        let free = (0..Self::CHANNELS_PER_CHIP).find(|channel| !used.contains(channel));
        let Some(channel) = free else {
            return Err(MapperError::out_of_resources(format!(
                "no analog output left on {chip}"
            )));
        };
        let aout = AnalogOutput(channel);
        self.items.push(AnalogOutputItem { logical, aout });
        Ok(aout)
    }

    /// All assignments in insertion order.
    #[must_use]
    pub fn items(&self) -> &[AnalogOutputItem] {
        &self.items
    }
}

/// Input spike times per biological source neuron, in biological seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpikeTimes {
    #[serde(with = "crate::util::map_as_pairs")]
    map: BTreeMap<BioNeuron, Vec<f64>>,
}

impl SpikeTimes {
    /// Record the spike train of one source neuron.
    pub fn set(&mut self, bio: BioNeuron, times: Vec<f64>) {
        self.map.insert(bio, times);
    }

    /// The spike train of one source neuron.
    #[must_use]
    pub fn get(&self, bio: BioNeuron) -> &[f64] {
        self.map.get(&bio).map_or(&[], Vec::as_slice)
    }

    /// Number of recorded trains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no trains are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Everything the mapping decided, in one serialisable container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Results {
    /// Claimed hardware.
    pub resources: Resources,
    /// Neuron and input placement.
    pub placement: Placement,
    /// Established L1 routes.
    pub l1_routing: L1Routing,
    /// Synapse driver, row and synapse assignments.
    pub synapse_routing: SynapseRouting,
    /// Analog-output assignments.
    pub analog_outputs: AnalogOutputs,
    /// Input spike trains.
    pub spike_times: SpikeTimes,
    /// Reverse lookup table.
    pub lookup: LookupTable,
}

/// On-disk encodings, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json { gz: bool },
    Bin { gz: bool },
}

impl Format {
    fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MapperError::serialization("results path has no file name"))?;

        let (stem, gz) = match name.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (name, false),
        };
        if stem.ends_with(".json") {
            Ok(Self::Json { gz })
        } else if stem.ends_with(".bin") {
            Ok(Self::Bin { gz })
        } else {
            Err(MapperError::serialization(format!(
                "unknown results format for '{name}': expected .json/.bin, optionally .gz"
            )))
        }
    }
}

impl Results {
    /// Load results from disk. The extension selects the format.
    ///
    /// # Errors
    ///
    /// I/O failures and malformed or unknown-field documents.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let file = File::open(path)?;
        let reader: Box<dyn Read> = match format {
            Format::Json { gz: true } | Format::Bin { gz: true } => {
                Box::new(GzDecoder::new(BufReader::new(file)))
            }
            _ => Box::new(BufReader::new(file)),
        };

        let results = match format {
            Format::Json { .. } => serde_json::from_reader(reader)
                .map_err(|e| MapperError::serialization(e.to_string()))?,
            Format::Bin { .. } => bincode::deserialize_from(reader)
                .map_err(|e| MapperError::serialization(e.to_string()))?,
        };
        info!(path = %path.display(), "results loaded");
        Ok(results)
    }

    /// Save results to disk. The extension selects the format; append
    /// `.gz` for compression.
    ///
    /// # Errors
    ///
    /// I/O or encoding failures.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let file = File::create(path)?;
        let writer: Box<dyn Write> = match format {
            Format::Json { gz: true } | Format::Bin { gz: true } => {
                Box::new(GzEncoder::new(BufWriter::new(file), Compression::default()))
            }
            _ => Box::new(BufWriter::new(file)),
        };

        match format {
            Format::Json { .. } => serde_json::to_writer(writer, self)
                .map_err(|e| MapperError::serialization(e.to_string()))?,
            Format::Bin { .. } => bincode::serialize_into(writer, self)
                .map_err(|e| MapperError::serialization(e.to_string()))?,
        }
        info!(path = %path.display(), "results saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wafermap_bio::PopulationId;
    use wafermap_chip::{NeuronBlockOnChip, NeuronBlockOnWafer};

    fn sample_results() -> Results {
        let mut results = Results::default();
        results.resources.allocated.push(ChipOnWafer::new(0, 0));
        let bio = BioNeuron::new(PopulationId(0), 0);
        let logical = LogicalNeuron::on_chip(
            NeuronBlockOnWafer {
                chip: ChipOnWafer::new(0, 0),
                block: NeuronBlockOnChip::new(0),
            },
            0,
            2,
        );
        results.placement.add(bio, logical);
        results.spike_times.set(bio, vec![0.001, 0.002]);
        results
    }

    #[test]
    fn save_load_round_trip_all_formats() {
        let dir = tempfile::tempdir().unwrap();
        let results = sample_results();
        for name in ["r.json", "r.bin", "r.json.gz", "r.bin.gz"] {
            let path = dir.path().join(name);
            results.save(&path).unwrap();
            let loaded = Results::load(&path).unwrap();
            assert_eq!(loaded, results, "round trip via {name}");
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let results = Results::default();
        assert!(results.save("/tmp/results.xml2").is_err());
        assert!(matches!(
            Results::load("/tmp/results.toml"),
            Err(MapperError::Serialization { .. })
        ));
    }

    #[test]
    fn unknown_fields_are_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.json");
        let results = Results::default();
        results.save(&path).unwrap();

        let mut doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        doc.as_object_mut().unwrap().insert("from_the_future".into(), 1.into());
        std::fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();

        assert!(matches!(Results::load(&path), Err(MapperError::Serialization { .. })));
    }

    #[test]
    fn analog_outputs_limited_per_chip() {
        let mut outputs = AnalogOutputs::default();
        let block = NeuronBlockOnWafer {
            chip: ChipOnWafer::new(0, 0),
            block: NeuronBlockOnChip::new(0),
        };
        let n0 = LogicalNeuron::on_chip(block, 0, 1);
        let n1 = LogicalNeuron::on_chip(block, 1, 1);
        let n2 = LogicalNeuron::on_chip(block, 2, 1);
        assert_eq!(outputs.reserve(n0).unwrap(), AnalogOutput(0));
        assert_eq!(outputs.reserve(n1).unwrap(), AnalogOutput(1));
        assert!(outputs.reserve(n2).is_err());
    }
}
