//! Builds a segmented filter file from a sorted hash list.
//!
//! Reads `SHA1HEX:count` lines (ascending by hash) from a file or
//! standard input, buckets the top 64 bits of each hash into `2^16`
//! segments by their leading 16 bits, builds one compressed xor filter
//! per segment, and writes the segments back to back followed by a
//! table of segment start offsets (`u64`, big-endian, one per segment).
//!
//! Unsorted input and duplicate hashes are usage errors: a message goes
//! to standard error and the exit code is non-zero.

#![allow(clippy::print_stderr)]

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::process::ExitCode;

use filter_oxide::XorPlus8;

const SEGMENT_BITS: u32 = 16;
const SEGMENT_COUNT: usize = 1 << SEGMENT_BITS;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: {} <hashes.txt | -> <filter.bin>", args[0]);
        return ExitCode::FAILURE;
    }
    match run(&args[1], &args[2]) {
        Ok(keys) => {
            eprintln!("wrote {} keys in {} segments to {}", keys, SEGMENT_COUNT, args[2]);
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(input: &str, output: &str) -> Result<u64, String> {
    let reader: Box<dyn Read> = if input == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(input).map_err(|e| format!("cannot open {}: {}", input, e))?)
    };
    let out = File::create(output).map_err(|e| format!("cannot create {}: {}", output, e))?;
    let mut writer = BufWriter::new(out);

    let mut starts = vec![0u64; SEGMENT_COUNT];
    let mut offset = 0u64;
    let mut current_segment = 0usize;
    let mut segment_keys: Vec<u64> = Vec::new();
    let mut previous: Option<u64> = None;
    let mut total = 0u64;

    for (number, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(|e| format!("read failure at line {}: {}", number + 1, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let key = parse_key(line).map_err(|e| format!("line {}: {}", number + 1, e))?;
        if let Some(prev) = previous {
            if key < prev {
                return Err(format!("line {}: input is not sorted", number + 1));
            }
            if key == prev {
                return Err(format!("line {}: duplicate hash", number + 1));
            }
        }
        previous = Some(key);
        total += 1;

        // sorted input means segments close in order; gap segments get
        // an empty filter each
        let segment = (key >> (64 - SEGMENT_BITS)) as usize;
        while current_segment < segment {
            starts[current_segment] = offset;
            offset = flush_segment(&mut writer, &mut segment_keys, offset)?;
            current_segment += 1;
        }
        segment_keys.push(key);
    }

    while current_segment < SEGMENT_COUNT {
        starts[current_segment] = offset;
        offset = flush_segment(&mut writer, &mut segment_keys, offset)?;
        current_segment += 1;
    }

    for start in &starts {
        writer
            .write_all(&start.to_be_bytes())
            .map_err(|e| format!("write failure: {}", e))?;
    }
    writer.flush().map_err(|e| format!("write failure: {}", e))?;
    Ok(total)
}

/// Parses one `SHA1HEX:count` line into the top 64 bits of the hash.
fn parse_key(line: &str) -> Result<u64, String> {
    let hex = line.split(':').next().unwrap_or("");
    if hex.len() < 16 || !hex.is_char_boundary(16) {
        return Err("hash shorter than 16 hex digits".to_string());
    }
    u64::from_str_radix(&hex[..16], 16).map_err(|_| format!("bad hash '{}'", hex))
}

/// Builds and writes the filter for one finished segment; returns the
/// new file offset.
fn flush_segment(
    writer: &mut BufWriter<File>,
    keys: &mut Vec<u64>,
    offset: u64,
) -> Result<u64, String> {
    let filter =
        XorPlus8::from_keys(keys).map_err(|e| format!("segment construction failed: {}", e))?;
    keys.clear();
    let bytes = filter.to_bytes();
    writer
        .write_all(&bytes)
        .map_err(|e| format!("write failure: {}", e))?;
    Ok(offset + bytes.len() as u64)
}
