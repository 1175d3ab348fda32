use std::collections::VecDeque;
use std::io;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::config::DemuxConfig;
use crate::demux::{Channel, DemuxStats, ProtocolDemux};
use crate::message::Event;

/// [`Decoder`] that runs one channel through a [`ProtocolDemux`].
///
/// Each read is handed to the engine in full; the resulting sink calls are
/// queued and yielded one [`Event`] at a time.
pub struct ZephyrCodec {
    demux: ProtocolDemux<VecDeque<Event>>,
    channel: Channel,
}

impl ZephyrCodec {
    pub fn new(config: DemuxConfig, channel: Channel) -> Self {
        Self {
            demux: ProtocolDemux::with_config(config, VecDeque::new()),
            channel,
        }
    }

    pub fn stats(&self) -> &DemuxStats {
        self.demux.stats()
    }
}

impl Decoder for ZephyrCodec {
    type Item = Event;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Event>, io::Error> {
        if !src.is_empty() {
            let chunk = src.split();
            self.demux.on_bytes_available(self.channel, &chunk);
        }
        Ok(self.demux.sink_mut().pop_front())
    }
}
