//! Binix Stream - pipe stdin through a stream bridge
//!
//! A producer thread delivers stdin in fixed-size chunks; the main thread
//! reads them back through the bridge and writes them to stdout.

use std::env;
use std::io::{self, Read, Write};
use std::process;
use std::thread;

use binix_stream::{BridgeConfig, NAME, VERSION, stream};

const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

struct Options {
    expected_headers: Vec<Vec<u8>>,
    chunk_size: usize,
}

fn main() {
    env_logger::init();

    let options = match parse_args(env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{}", message);
            print_usage();
            process::exit(1);
        }
    };

    match run(options) {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(1);
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options {
        expected_headers: Vec::new(),
        chunk_size: DEFAULT_CHUNK_SIZE,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--expect" => {
                let header = args.next().ok_or("--expect needs a header")?;
                options.expected_headers.push(header.into_bytes());
            }
            "--chunk-size" => {
                let size = args.next().ok_or("--chunk-size needs a value")?;
                options.chunk_size = size
                    .parse::<usize>()
                    .ok()
                    .filter(|&size| size > 0)
                    .ok_or_else(|| format!("invalid chunk size: {}", size))?;
            }
            "--version" => {
                println!("{} v{}", NAME, VERSION);
                process::exit(0);
            }
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(options)
}

fn print_usage() {
    eprintln!("usage: binix-stream [--expect HEADER]... [--chunk-size BYTES]");
}

/// Returns `Ok(false)` when expected headers were given and none matched
fn run(options: Options) -> io::Result<bool> {
    let (producer, bridge) = stream::open(BridgeConfig::default(), ());
    let chunk_size = options.chunk_size;

    let delivery = thread::spawn(move || -> io::Result<()> {
        let mut stdin = io::stdin().lock();
        let mut buf = vec![0u8; chunk_size];
        loop {
            let count = match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(count) => count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    producer.fail(&e);
                    return Err(e);
                }
            };
            producer.append_chunk(buf[..count].to_vec())?;
            if producer.is_closed() {
                return Ok(());
            }
        }
        producer.signal_eof()?;
        Ok(())
    });

    if !options.expected_headers.is_empty() && !bridge.check_header(&options.expected_headers)? {
        log::warn!("stream header did not match any expected header");
        // The delivery thread may still be blocked on stdin; it stops at its
        // next chunk once it sees the close.
        bridge.close();
        return Ok(false);
    }

    let mut stdout = io::stdout().lock();
    io::copy(&mut &bridge, &mut stdout)?;
    stdout.flush()?;

    let stats = bridge.stats();
    log::info!(
        "copied {} bytes in {} chunks ({} resume requests)",
        stats.bytes_read,
        stats.chunks_appended,
        stats.resume_requests
    );
    join(delivery)?;
    Ok(true)
}

fn join(delivery: thread::JoinHandle<io::Result<()>>) -> io::Result<()> {
    delivery
        .join()
        .map_err(|_| io::Error::other("delivery thread panicked"))?
}
