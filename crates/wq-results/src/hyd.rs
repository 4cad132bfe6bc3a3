//! Hydraulics record stream.
//!
//! One record per hydraulic interval, fixed little-endian layout:
//!
//! ```text
//! +------------------+
//! | magic      (4B)  |  "HQGM"
//! | version    (4B)  |
//! | node count (4B)  |
//! | link count (4B)  |
//! | periods    (4B)  |  backpatched on finish
//! +------------------+
//! | demand  f32 x n  |  per interval, repeated `periods` times
//! | head    f32 x n  |
//! | flow    f32 x m  |
//! | status  u32 x m  |  0 = closed, 1 = open
//! | duration f64     |  seconds until the next hydraulic change
//! +------------------+
//! | magic      (4B)  |
//! +------------------+
//! ```

use crate::bytes::{read_f32, read_f64, read_u32, write_f32, write_f64, write_u32};
use crate::{ResultsError, ResultsResult, MAGIC};
use std::io::{Read, Seek, SeekFrom, Write};
use wq_core::Real;
use wq_network::{HydraulicState, LinkStatus, Network};

pub const HYD_VERSION: u32 = 1;

/// Offset of the period-count field inside the header.
const PERIODS_OFFSET: u64 = 16;

/// Produces a hydraulics stream; the hydraulic solver's side of the
/// interface, and the test fixture for [`HydReader`].
pub struct HydWriter<W: Write + Seek> {
    writer: W,
    n_nodes: usize,
    n_links: usize,
    periods: u32,
}

impl<W: Write + Seek> HydWriter<W> {
    pub fn new(mut writer: W, n_nodes: usize, n_links: usize) -> ResultsResult<Self> {
        write_u32(&mut writer, MAGIC)?;
        write_u32(&mut writer, HYD_VERSION)?;
        write_u32(&mut writer, n_nodes as u32)?;
        write_u32(&mut writer, n_links as u32)?;
        // period count is backpatched on finish
        write_u32(&mut writer, 0)?;
        Ok(Self {
            writer,
            n_nodes,
            n_links,
            periods: 0,
        })
    }

    pub fn write_interval(&mut self, hyd: &HydraulicState) -> ResultsResult<()> {
        check_len("demand record", hyd.demands.len(), self.n_nodes)?;
        check_len("head record", hyd.heads.len(), self.n_nodes)?;
        check_len("flow record", hyd.flows.len(), self.n_links)?;
        check_len("status record", hyd.status.len(), self.n_links)?;

        for &d in &hyd.demands {
            write_f32(&mut self.writer, d as f32)?;
        }
        for &h in &hyd.heads {
            write_f32(&mut self.writer, h as f32)?;
        }
        for &q in &hyd.flows {
            write_f32(&mut self.writer, q as f32)?;
        }
        for &s in &hyd.status {
            write_u32(&mut self.writer, (s == LinkStatus::Open) as u32)?;
        }
        write_f64(&mut self.writer, hyd.duration)?;
        self.periods += 1;
        Ok(())
    }

    /// Write the trailing magic, backpatch the period count, and hand
    /// the writer back.
    pub fn finish(mut self) -> ResultsResult<W> {
        write_u32(&mut self.writer, MAGIC)?;
        self.writer.seek(SeekFrom::Start(PERIODS_OFFSET))?;
        write_u32(&mut self.writer, self.periods)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Pulls hydraulic intervals off a stream, validating the header
/// against the network and clamping near-stagnant flows to zero.
#[derive(Debug)]
pub struct HydReader<R: Read> {
    reader: R,
    n_nodes: usize,
    n_links: usize,
    periods: u32,
    next: u32,
    stagnant: Real,
}

impl<R: Read> HydReader<R> {
    pub fn open(mut reader: R, net: &Network, stagnant: Real) -> ResultsResult<Self> {
        expect_magic(&mut reader)?;
        let version = read_u32(&mut reader)?;
        if version != HYD_VERSION {
            return Err(ResultsError::Version {
                got: version,
                want: HYD_VERSION,
            });
        }
        let n_nodes = read_u32(&mut reader)? as usize;
        let n_links = read_u32(&mut reader)? as usize;
        if n_nodes != net.nodes().len() {
            return Err(ResultsError::CountMismatch {
                what: "node",
                got: n_nodes,
                want: net.nodes().len(),
            });
        }
        if n_links != net.links().len() {
            return Err(ResultsError::CountMismatch {
                what: "link",
                got: n_links,
                want: net.links().len(),
            });
        }
        let periods = read_u32(&mut reader)?;
        tracing::debug!(periods, n_nodes, n_links, "hydraulics stream opened");
        Ok(Self {
            reader,
            n_nodes,
            n_links,
            periods,
            next: 0,
            stagnant,
        })
    }

    pub fn periods(&self) -> u32 {
        self.periods
    }

    /// The next hydraulic interval, or `None` once every stored period
    /// has been read and the trailing magic has checked out.
    pub fn next_interval(&mut self) -> ResultsResult<Option<HydraulicState>> {
        if self.next >= self.periods {
            expect_magic(&mut self.reader)?;
            return Ok(None);
        }
        self.next += 1;

        let mut demands = Vec::with_capacity(self.n_nodes);
        for _ in 0..self.n_nodes {
            demands.push(read_f32(&mut self.reader)? as Real);
        }
        let mut heads = Vec::with_capacity(self.n_nodes);
        for _ in 0..self.n_nodes {
            heads.push(read_f32(&mut self.reader)? as Real);
        }
        let mut flows = Vec::with_capacity(self.n_links);
        for _ in 0..self.n_links {
            let q = read_f32(&mut self.reader)? as Real;
            flows.push(if q.abs() < self.stagnant { 0.0 } else { q });
        }
        let mut status = Vec::with_capacity(self.n_links);
        for _ in 0..self.n_links {
            status.push(if read_u32(&mut self.reader)? == 0 {
                LinkStatus::Closed
            } else {
                LinkStatus::Open
            });
        }
        let duration = read_f64(&mut self.reader)?;

        Ok(Some(HydraulicState {
            demands,
            heads,
            flows,
            status,
            duration,
        }))
    }
}

fn expect_magic<R: Read>(reader: &mut R) -> ResultsResult<()> {
    let got = read_u32(reader)?;
    if got != MAGIC {
        return Err(ResultsError::BadMagic { got, want: MAGIC });
    }
    Ok(())
}

fn check_len(what: &'static str, got: usize, want: usize) -> ResultsResult<()> {
    if got != want {
        return Err(ResultsError::BadLength { what, got, want });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use wq_network::{NetworkBuilder, Species};

    fn two_pipe_net() -> Network {
        let mut b = NetworkBuilder::new();
        b.add_species(Species::bulk("Tracer"));
        let a = b.add_node("A");
        let c = b.add_node("B");
        let d = b.add_node("C");
        b.add_link("P1", a, c, 0.3, 100.0, 0.0003);
        b.add_link("P2", c, d, 0.3, 100.0, 0.0003);
        b.build().unwrap()
    }

    fn interval(q: f64) -> HydraulicState {
        HydraulicState {
            demands: vec![-q, 0.0, q],
            heads: vec![50.0, 48.0, 46.0],
            flows: vec![q, q],
            status: vec![LinkStatus::Open, LinkStatus::Open],
            duration: 3600.0,
        }
    }

    #[test]
    fn stream_round_trips() {
        let mut w = HydWriter::new(Cursor::new(Vec::new()), 3, 2).unwrap();
        w.write_interval(&interval(0.25)).unwrap();
        w.write_interval(&interval(-0.5)).unwrap();
        let buf = w.finish().unwrap().into_inner();

        let net = two_pipe_net();
        let mut r = HydReader::open(Cursor::new(buf), &net, 1e-8).unwrap();
        assert_eq!(r.periods(), 2);

        let first = r.next_interval().unwrap().unwrap();
        assert_eq!(first.flows, vec![0.25, 0.25]);
        assert_eq!(first.heads[0], 50.0);
        assert_eq!(first.duration, 3600.0);

        let second = r.next_interval().unwrap().unwrap();
        assert_eq!(second.flows, vec![-0.5, -0.5]);

        assert!(r.next_interval().unwrap().is_none());
    }

    #[test]
    fn near_stagnant_flows_clamp_to_zero() {
        let mut w = HydWriter::new(Cursor::new(Vec::new()), 3, 2).unwrap();
        let mut hyd = interval(1e-12);
        hyd.flows[1] = 0.5;
        w.write_interval(&hyd).unwrap();
        let buf = w.finish().unwrap().into_inner();

        let net = two_pipe_net();
        let mut r = HydReader::open(Cursor::new(buf), &net, 1e-8).unwrap();
        let got = r.next_interval().unwrap().unwrap();
        assert_eq!(got.flows, vec![0.0, 0.5]);
    }

    #[test]
    fn closed_status_survives_the_trip() {
        let mut w = HydWriter::new(Cursor::new(Vec::new()), 3, 2).unwrap();
        let mut hyd = interval(0.25);
        hyd.status[1] = LinkStatus::Closed;
        w.write_interval(&hyd).unwrap();
        let buf = w.finish().unwrap().into_inner();

        let net = two_pipe_net();
        let mut r = HydReader::open(Cursor::new(buf), &net, 1e-8).unwrap();
        let got = r.next_interval().unwrap().unwrap();
        assert_eq!(got.status, vec![LinkStatus::Open, LinkStatus::Closed]);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let buf = vec![0xDEu8, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0];
        let net = two_pipe_net();
        let err = HydReader::open(Cursor::new(buf), &net, 1e-8).unwrap_err();
        assert!(matches!(err, ResultsError::BadMagic { .. }));
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let w = HydWriter::new(Cursor::new(Vec::new()), 7, 2).unwrap();
        let buf = w.finish().unwrap().into_inner();
        let net = two_pipe_net();
        let err = HydReader::open(Cursor::new(buf), &net, 1e-8).unwrap_err();
        assert!(matches!(
            err,
            ResultsError::CountMismatch { what: "node", .. }
        ));
    }

    #[test]
    fn truncated_stream_surfaces_as_io_error() {
        let mut w = HydWriter::new(Cursor::new(Vec::new()), 3, 2).unwrap();
        w.write_interval(&interval(0.25)).unwrap();
        let mut buf = w.finish().unwrap().into_inner();
        buf.truncate(buf.len() - 10);

        let net = two_pipe_net();
        let mut r = HydReader::open(Cursor::new(buf), &net, 1e-8).unwrap();
        let err = r.next_interval().unwrap_err();
        assert!(matches!(err, ResultsError::Io(_)));
    }
}
