// Library lints
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(unsafe_code)]

use crate::capture::CaptureMetadata;
use crate::context::Context;
use crate::error::CaptureError;
use crate::frame::Frame;
use crate::options::Options;
use crate::parser::ProtocolParser;
use crate::resolver::Resolver;
use log::info;
use std::path::Path;

type ProgressFn<'p> = Box<dyn FnMut(&[Frame]) + 'p>;

/// Turns a whole pcap or pcapng buffer into a [`Context`].
pub struct Dissector<'p> {
    options: Options,
    progress: Option<ProgressFn<'p>>,
}

impl<'p> Dissector<'p> {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            progress: None,
        }
    }

    /// Hands every `batch_size` freshly dissected frames to `callback`, and
    /// the rest once the capture ends.
    pub fn with_progress(mut self, callback: impl FnMut(&[Frame]) + 'p) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<Context, CaptureError> {
        let bytes = std::fs::read(path)?;
        self.parse(&bytes)
    }

    pub fn parse(&mut self, bytes: &[u8]) -> Result<Context, CaptureError> {
        let mut resolver = Resolver::new();
        let mut metadata = CaptureMetadata::default();
        let mut frames: Vec<Frame> = vec![];
        let mut delivered = 0;

        let options = &self.options;
        let progress = &mut self.progress;
        let batch_size = options.batch_size.max(1);

        capture::parse(bytes, &mut metadata, |raw| {
            let index = frames.len() + 1;
            let frame = ProtocolParser::new(raw.link_type).process(
                index,
                raw.header,
                raw.data.to_vec(),
                &mut resolver,
                options,
            );
            frames.push(frame);

            if frames.len() - delivered >= batch_size {
                if let Some(callback) = progress.as_mut() {
                    callback(frames.get(delivered..).unwrap_or_default());
                }
                delivered = frames.len();
            }
        })?;

        if let Some(callback) = progress.as_mut() {
            let rest = frames.get(delivered..).unwrap_or_default();
            if !rest.is_empty() {
                callback(rest);
            }
        }

        resolver.flush();
        info!(
            "Capture parsed: {} frames, {} TCP connections, {} DNS records.",
            frames.len(),
            resolver.tcp_connections.len(),
            resolver.dns_records.len()
        );

        Ok(Context::new(frames, metadata, resolver))
    }
}

pub fn parse(bytes: &[u8], options: Options) -> Result<Context, CaptureError> {
    Dissector::new(options).parse(bytes)
}

pub mod capture;
pub mod context;
pub mod error;
pub mod field;
pub mod frame;
pub mod options;
pub mod parser;
pub mod protocols;
pub mod reader;
pub mod resolver;

#[cfg(test)]
mod test_utils;
