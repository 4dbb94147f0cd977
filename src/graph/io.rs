//! Adjacency-list input format.
//!
//! Line 1 holds `N M` (vertex and edge counts). Line `i + 2` lists the
//! outgoing edges of vertex `i` as `dest capacity` pairs. The source is
//! vertex 0 and the sink is vertex `N - 1`.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::warn;
use thiserror::Error;

use crate::graph::ids::GlobalId;
use crate::graph::store::{InEdge, OutEdge, Vertex};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing header line")]
    MissingHeader,
    #[error("malformed header: {0:?}")]
    MalformedHeader(String),
    #[error("line {line}: malformed edge pair")]
    MalformedEdge { line: usize },
    #[error("line {line}: destination {dest} out of range for {count} vertices")]
    DestOutOfRange {
        line: usize,
        dest: usize,
        count: usize,
    },
    #[error("line {line}: negative capacity {capacity}")]
    NegativeCapacity { line: usize, capacity: i32 },
}

pub fn load_graph<P: AsRef<Path>>(path: P) -> Result<Vec<Vertex>, ParseError> {
    let file = File::open(path)?;
    read_adjacency(BufReader::new(file))
}

pub fn read_adjacency<R: BufRead>(reader: R) -> Result<Vec<Vertex>, ParseError> {
    let mut lines = reader.lines();
    let header = lines.next().ok_or(ParseError::MissingHeader)??;
    let (vertex_count, declared_edges) = {
        let mut fields = header.split_whitespace();
        match (
            fields.next().map(str::parse::<usize>),
            fields.next().map(str::parse::<usize>),
        ) {
            (Some(Ok(n)), Some(Ok(m))) => (n, m),
            _ => return Err(ParseError::MalformedHeader(header)),
        }
    };

    let mut vertices: Vec<Vertex> = (0..vertex_count)
        .map(|i| Vertex::new(GlobalId::new(i as u64)))
        .collect();

    let mut edge_count = 0;
    for (i, line) in lines.enumerate() {
        let line = line?;
        let line_no = i + 2;
        if i >= vertex_count {
            if !line.trim().is_empty() {
                warn!("ignoring trailing line {line_no}");
            }
            continue;
        }
        let mut fields = line.split_whitespace();
        while let Some(dest_field) = fields.next() {
            let dest: usize = dest_field
                .parse()
                .map_err(|_| ParseError::MalformedEdge { line: line_no })?;
            let capacity: i32 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or(ParseError::MalformedEdge { line: line_no })?;
            if dest >= vertex_count {
                return Err(ParseError::DestOutOfRange {
                    line: line_no,
                    dest,
                    count: vertex_count,
                });
            }
            if capacity < 0 {
                return Err(ParseError::NegativeCapacity {
                    line: line_no,
                    capacity,
                });
            }
            vertices[i]
                .out_edges
                .push(OutEdge::new(GlobalId::new(dest as u64), capacity));
            vertices[dest]
                .in_edges
                .push(InEdge::new(GlobalId::new(i as u64)));
            edge_count += 1;
        }
    }

    if edge_count != declared_edges {
        warn!("header declared {declared_edges} edges but {edge_count} were read");
    }
    Ok(vertices)
}
