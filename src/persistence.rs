//! Versioned binary encoding of networks.
//!
//! Every stream starts with the magic string `FFNET` and an `i32` version.
//! Version 1 continues with:
//!
//! * `i32` input count, `i32` layer count, then one `i32` output count per
//!   layer;
//! * per layer, per output neuron: the `f64` bias followed by the `f64`
//!   weight from every input, in input order;
//! * after each layer's parameters, the activator name as a string.
//!
//! Integers and floats are big-endian, strings are a `u16` byte length
//! followed by UTF-8 bytes. Dropout settings are not stored.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array1, Array2};
use tracing::info;

use crate::activator::Activator;
use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::network::Network;
use crate::stream::{DataRead, DataWrite};

pub const MAGIC: &str = "FFNET";

/// The newest version this crate writes.
pub const CURRENT_VERSION: i32 = 1;

/// Encodes `network` into `stream` using format `version`.
pub fn write<W: Write + ?Sized>(network: &Network, version: i32, stream: &mut W) -> Result<()> {
    if version != 1 {
        return Err(Error::UnsupportedFormat(format!("cannot write version {}", version)));
    }
    stream.write_string(MAGIC)?;
    stream.write_i32(version)?;
    write_v1(network, stream)
}

/// Decodes a network from `stream`.
pub fn read<R: Read + ?Sized>(stream: &mut R) -> Result<Network> {
    let magic = match stream.read_string() {
        Ok(magic) => magic,
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return Err(Error::UnsupportedFormat(format!("bad magic: {}", e)))
        }
        Err(e) => return Err(e.into()),
    };
    if magic != MAGIC {
        return Err(Error::UnsupportedFormat(format!("bad magic {:?}", magic)));
    }
    match stream.read_i32()? {
        1 => read_v1(stream),
        version => Err(Error::UnsupportedFormat(format!("unknown version {}", version))),
    }
}

/// Writes `network` to the file at `path` in the current format.
pub fn save<P: AsRef<Path>>(network: &Network, path: P) -> Result<()> {
    let mut stream = BufWriter::new(File::create(path.as_ref())?);
    write(network, CURRENT_VERSION, &mut stream)?;
    stream.flush()?;
    info!(path = %path.as_ref().display(), layers = network.depth(), "saved network");
    Ok(())
}

/// Reads a network from the file at `path`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Network> {
    let network = read(&mut BufReader::new(File::open(path.as_ref())?))?;
    info!(path = %path.as_ref().display(), layers = network.depth(), "loaded network");
    Ok(network)
}

fn write_v1<W: Write + ?Sized>(network: &Network, stream: &mut W) -> Result<()> {
    stream.write_i32(encode_len(network.input_len())?)?;
    stream.write_i32(encode_len(network.depth())?)?;
    for layer in network.layers() {
        stream.write_i32(encode_len(layer.output_len())?)?;
    }
    for layer in network.layers() {
        let weights = layer.weights();
        for (j, bias) in layer.bias().iter().enumerate() {
            stream.write_f64(*bias)?;
            for w in weights.column(j) {
                stream.write_f64(*w)?;
            }
        }
        stream.write_string(layer.activator().name())?;
    }
    Ok(())
}

fn read_v1<R: Read + ?Sized>(stream: &mut R) -> Result<Network> {
    let inputs = decode_len(stream.read_i32()?)?;
    let depth = decode_len(stream.read_i32()?)?;
    // The sizes come first, so the whole topology is known before any
    // parameter is read.
    let sizes = (0..depth)
        .map(|_| decode_len(stream.read_i32()?))
        .collect::<Result<Vec<_>>>()?;

    // Buffers grow with the bytes actually read, so a short stream hits EOF
    // before its declared sizes are allocated.
    let mut layers = Vec::new();
    let mut previous = inputs;
    for &outputs in &sizes {
        let mut bias = Vec::new();
        let mut weights = Vec::new();
        for _ in 0..outputs {
            bias.push(stream.read_f64()?);
            for _ in 0..previous {
                weights.push(stream.read_f64()?);
            }
        }
        let activator: Activator = stream.read_string()?.parse()?;
        // Stored one neuron per row; the layer keeps one neuron per column.
        let weights = Array2::from_shape_vec((outputs, previous), weights)
            .map_err(|e| Error::UnsupportedFormat(e.to_string()))?
            .reversed_axes();
        let layer = Layer::from_parts(weights, Array1::from(bias), activator)
            .map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
        layers.push(layer);
        previous = outputs;
    }
    Network::from_layers(layers).map_err(|e| Error::UnsupportedFormat(e.to_string()))
}

fn encode_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::UnsupportedFormat(format!("size {} does not fit", len)))
}

fn decode_len(len: i32) -> Result<usize> {
    match usize::try_from(len) {
        Ok(len) if len > 0 => Ok(len),
        _ => Err(Error::UnsupportedFormat(format!("invalid size {}", len))),
    }
}
