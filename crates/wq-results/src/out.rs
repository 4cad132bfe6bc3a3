//! Quality results stream.
//!
//! In series mode, every reporting period stores one f32 per
//! (object, species), nodes first then links, species contiguous per
//! object. In a statistical mode nothing is stored per period; a single
//! post-processed record per object is written at close. Either way the
//! stream ends with a trailer:
//!
//! ```text
//! | results offset (8B) | period count (4B) | status (4B) | magic (4B) |
//! ```

use crate::bytes::{read_f32, read_u32, read_u64, write_f32, write_u32, write_u64};
use crate::{ResultsError, ResultsResult, MAGIC};
use std::io::{Read, Seek, SeekFrom, Write};
use wq_core::Real;
use wq_network::Network;

pub const OUT_VERSION: u32 = 1;

/// Length of the fixed trailer in bytes.
const TRAILER_LEN: u64 = 8 + 4 + 4 + 4;

/// What each stored value represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatKind {
    /// Full time series, one record per reporting period.
    #[default]
    Series,
    /// Time average per object.
    Average,
    /// Minimum over the run per object.
    Minimum,
    /// Maximum over the run per object.
    Maximum,
    /// Max minus min over the run per object.
    Range,
}

impl StatKind {
    fn code(self) -> u32 {
        match self {
            Self::Series => 0,
            Self::Average => 1,
            Self::Minimum => 2,
            Self::Maximum => 3,
            Self::Range => 4,
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Series,
            1 => Self::Average,
            2 => Self::Minimum,
            3 => Self::Maximum,
            4 => Self::Range,
            _ => return None,
        })
    }
}

/// How the run that produced the stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Success,
    Aborted,
}

impl CompletionStatus {
    fn code(self) -> u32 {
        match self {
            Self::Success => 0,
            Self::Aborted => 1,
        }
    }
}

/// Streams quality values out per reporting period, or accumulates
/// them for a statistical summary written at close.
pub struct OutWriter<W: Write + Seek> {
    writer: W,
    stat: StatKind,
    /// Values per record: (nodes + links) x species.
    width: usize,
    periods: u32,
    sum: Vec<Real>,
    min: Vec<Real>,
    max: Vec<Real>,
}

impl<W: Write + Seek> OutWriter<W> {
    pub fn new(mut writer: W, net: &Network, stat: StatKind) -> ResultsResult<Self> {
        let ns = net.n_species();
        let width = (net.nodes().len() + net.links().len()) * ns;
        write_u32(&mut writer, MAGIC)?;
        write_u32(&mut writer, OUT_VERSION)?;
        write_u32(&mut writer, stat.code())?;
        write_u32(&mut writer, net.nodes().len() as u32)?;
        write_u32(&mut writer, net.links().len() as u32)?;
        write_u32(&mut writer, ns as u32)?;
        Ok(Self {
            writer,
            stat,
            width,
            periods: 0,
            sum: vec![0.0; width],
            min: vec![Real::INFINITY; width],
            max: vec![Real::NEG_INFINITY; width],
        })
    }

    /// Record one reporting period. `values` holds one entry per
    /// (object, species): all nodes first, then all links, species
    /// contiguous within each object.
    pub fn write_period(&mut self, values: &[Real]) -> ResultsResult<()> {
        if values.len() != self.width {
            return Err(ResultsError::BadLength {
                what: "period record",
                got: values.len(),
                want: self.width,
            });
        }
        if self.stat == StatKind::Series {
            for &v in values {
                write_f32(&mut self.writer, v as f32)?;
            }
        } else {
            for (i, &v) in values.iter().enumerate() {
                self.sum[i] += v;
                self.min[i] = self.min[i].min(v);
                self.max[i] = self.max[i].max(v);
            }
        }
        self.periods += 1;
        Ok(())
    }

    /// Emit the statistical record (if any) and the trailer.
    pub fn finish(mut self, status: CompletionStatus) -> ResultsResult<W> {
        if self.stat != StatKind::Series && self.periods > 0 {
            let n = self.periods as Real;
            for i in 0..self.width {
                let v = match self.stat {
                    StatKind::Average => self.sum[i] / n,
                    StatKind::Minimum => self.min[i],
                    StatKind::Maximum => self.max[i],
                    StatKind::Series | StatKind::Range => self.max[i] - self.min[i],
                };
                write_f32(&mut self.writer, v as f32)?;
            }
        }
        write_u64(&mut self.writer, header_len())?;
        write_u32(&mut self.writer, self.periods)?;
        write_u32(&mut self.writer, status.code())?;
        write_u32(&mut self.writer, MAGIC)?;
        self.writer.flush()?;
        tracing::debug!(periods = self.periods, stat = ?self.stat, "results stream closed");
        Ok(self.writer)
    }
}

fn header_len() -> u64 {
    6 * 4
}

/// Random-access reader for a finished results stream; the reporting
/// side of the interface, and the verification half of the writer
/// tests.
pub struct OutReader<R: Read + Seek> {
    reader: R,
    stat: StatKind,
    n_nodes: usize,
    n_links: usize,
    n_species: usize,
    width: usize,
    results_offset: u64,
    periods: u32,
    failed: bool,
}

impl<R: Read + Seek> OutReader<R> {
    pub fn open(mut reader: R) -> ResultsResult<Self> {
        let got = read_u32(&mut reader)?;
        if got != MAGIC {
            return Err(ResultsError::BadMagic { got, want: MAGIC });
        }
        let version = read_u32(&mut reader)?;
        if version != OUT_VERSION {
            return Err(ResultsError::Version {
                got: version,
                want: OUT_VERSION,
            });
        }
        let stat_code = read_u32(&mut reader)?;
        let stat = StatKind::from_code(stat_code).ok_or(ResultsError::BadLength {
            what: "statistic code",
            got: stat_code as usize,
            want: 4,
        })?;
        let n_nodes = read_u32(&mut reader)? as usize;
        let n_links = read_u32(&mut reader)? as usize;
        let n_species = read_u32(&mut reader)? as usize;

        reader.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
        let results_offset = read_u64(&mut reader)?;
        let periods = read_u32(&mut reader)?;
        let status = read_u32(&mut reader)?;
        let got = read_u32(&mut reader)?;
        if got != MAGIC {
            return Err(ResultsError::BadMagic { got, want: MAGIC });
        }

        Ok(Self {
            reader,
            stat,
            n_nodes,
            n_links,
            n_species,
            width: (n_nodes + n_links) * n_species,
            results_offset,
            periods,
            failed: status != 0,
        })
    }

    pub fn stat(&self) -> StatKind {
        self.stat
    }

    pub fn n_species(&self) -> usize {
        self.n_species
    }

    /// Reporting periods the run covered (even when only a summary
    /// record is stored).
    pub fn periods(&self) -> u32 {
        self.periods
    }

    pub fn run_failed(&self) -> bool {
        self.failed
    }

    /// Records actually present in the stream.
    pub fn stored_records(&self) -> usize {
        match self.stat {
            StatKind::Series => self.periods as usize,
            _ if self.periods > 0 => 1,
            _ => 0,
        }
    }

    /// Read one stored record: all nodes then all links, `n_species`
    /// values per object.
    pub fn read_record(&mut self, index: usize) -> ResultsResult<Vec<f32>> {
        if index >= self.stored_records() {
            return Err(ResultsError::PeriodOutOfRange {
                got: index,
                want: self.stored_records(),
            });
        }
        let offset = self.results_offset + (index * self.width * 4) as u64;
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut record = Vec::with_capacity(self.width);
        for _ in 0..self.width {
            record.push(read_f32(&mut self.reader)?);
        }
        Ok(record)
    }

    /// Value for one node and species in a stored record.
    pub fn node_value(&mut self, index: usize, node: usize, species: usize) -> ResultsResult<f32> {
        let record = self.read_record(index)?;
        Ok(record[node * self.n_species + species])
    }

    /// Value for one link and species in a stored record.
    pub fn link_value(&mut self, index: usize, link: usize, species: usize) -> ResultsResult<f32> {
        let record = self.read_record(index)?;
        Ok(record[(self.n_nodes + link) * self.n_species + species])
    }
}
