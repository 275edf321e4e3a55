// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loads a raw ADPCM block into SPU RAM, keys on voice 0, and renders a
//! fixed number of frames to a WAV file. Exercises the register file, the
//! mixer, and the `DumpWriter` hook end to end without a host system.

use clap::Parser;
use log::{error, info, warn};
use serde::Deserialize;
use spu_core::core::audio::NullAudioSink;
use spu_core::core::error::{Result, SpuError};
use spu_core::core::interrupt::InterruptController;
use spu_core::core::spu::environment::{CdAudioFifo, DmaRequestLine, DumpWriter, SpuEnvironment};
use spu_core::core::spu::Spu;
use spu_core::core::timing::TimingEventManager;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

/// Render a short SPU mixer session to a WAV file.
#[derive(Parser)]
#[command(name = "spu-demo")]
#[command(about = "SPU core smoke test: key on a voice, render audio, dump a WAV", long_about = None)]
struct Args {
    /// Output WAV path
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Number of mixer ticks (44100 Hz, so 44100 = 1 second)
    #[arg(short = 'n', long)]
    frames: Option<usize>,

    /// Voice sample rate register value (0x1000 = native 44100 Hz pitch)
    #[arg(long)]
    pitch: Option<u16>,

    /// Optional TOML file providing defaults for the above, overridden by
    /// both explicit CLI flags and `SPU_*` environment variables.
    #[arg(long)]
    config: Option<String>,
}

/// Lowest-priority settings source, loaded from `--config <path>.toml`.
#[derive(Debug, Default, Deserialize)]
struct DemoConfig {
    output: Option<String>,
    frames: Option<usize>,
    pitch: Option<u16>,
    debounce_ticks: Option<u8>,
}

impl DemoConfig {
    fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    warn!("ignoring malformed config '{path}': {e}");
                    Self::default()
                }
            },
            Err(e) => {
                warn!("could not read config '{path}': {e}");
                Self::default()
            }
        }
    }
}

struct WavDumpWriter {
    file: Option<File>,
    frames_written: u32,
}

impl WavDumpWriter {
    fn new() -> Self {
        Self { file: None, frames_written: 0 }
    }
}

impl DumpWriter for WavDumpWriter {
    fn open(&mut self, path: &str, sample_rate: u32, channels: u16) -> bool {
        let mut file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                error!("failed to open dump '{path}': {e}");
                return false;
            }
        };

        let byte_rate = sample_rate * u32::from(channels) * 2;
        let block_align = channels * 2;

        let write_header = |file: &mut File| -> std::io::Result<()> {
            file.write_all(b"RIFF")?;
            file.write_all(&0u32.to_le_bytes())?; // patched on close
            file.write_all(b"WAVE")?;
            file.write_all(b"fmt ")?;
            file.write_all(&16u32.to_le_bytes())?;
            file.write_all(&1u16.to_le_bytes())?; // PCM
            file.write_all(&channels.to_le_bytes())?;
            file.write_all(&sample_rate.to_le_bytes())?;
            file.write_all(&byte_rate.to_le_bytes())?;
            file.write_all(&block_align.to_le_bytes())?;
            file.write_all(&16u16.to_le_bytes())?; // bits per sample
            file.write_all(b"data")?;
            file.write_all(&0u32.to_le_bytes())?; // patched on close
            Ok(())
        };

        if let Err(e) = write_header(&mut file) {
            error!("failed to write WAV header for '{path}': {e}");
            return false;
        }

        self.file = Some(file);
        self.frames_written = 0;
        true
    }

    fn write_frames(&mut self, frames: &[(i16, i16)]) {
        let Some(file) = self.file.as_mut() else { return };
        for &(left, right) in frames {
            let _ = file.write_all(&left.to_le_bytes());
            let _ = file.write_all(&right.to_le_bytes());
        }
        self.frames_written += frames.len() as u32;
    }

    fn close(&mut self) {
        let Some(file) = self.file.as_mut() else { return };
        let data_bytes = self.frames_written * 4;
        let riff_bytes = 36 + data_bytes;
        let _ = file.seek(SeekFrom::Start(4));
        let _ = file.write_all(&riff_bytes.to_le_bytes());
        let _ = file.seek(SeekFrom::Start(40));
        let _ = file.write_all(&data_bytes.to_le_bytes());
        self.file = None;
    }
}

struct NullDmaRequest;
impl DmaRequestLine for NullDmaRequest {
    fn set_request(&mut self, _asserted: bool) {}
}

/// Writes one 16-byte ADPCM block: a shift/filter byte, a flag byte, and
/// 28 4-bit samples packed two to a byte.
fn write_adpcm_block(spu: &mut Spu, word_addr: u16, shift_filter: u8, flags: u8, nibbles: &[u8]) {
    let base = u32::from(word_addr) * 8;
    spu.write_ram(base, shift_filter);
    spu.write_ram(base + 1, flags);
    for (i, pair) in nibbles.chunks(2).enumerate() {
        let lo = pair[0] & 0x0F;
        let hi = pair.get(1).copied().unwrap_or(0) & 0x0F;
        spu.write_ram(base + 2 + i as u32, lo | (hi << 4));
    }
}

fn main() -> Result<()> {
    // File is optional - if not present, fall back to defaults or OS environment variables.
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    env_logger::Builder::from_default_env().filter_level(log::LevelFilter::Info).init();

    info!("spu-demo v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = args.config.as_deref().map(DemoConfig::load).unwrap_or_default();

    let mut output = args.output.or(config.output).unwrap_or_else(|| "spu-demo.wav".to_string());
    let frames = args.frames.or(config.frames).unwrap_or(44_100);
    let pitch = args.pitch.or(config.pitch).unwrap_or(4096);
    let mut debounce_ticks = config.debounce_ticks.unwrap_or(2);

    if let Ok(path) = std::env::var("SPU_DUMP_PATH") {
        output = path;
    }
    if let Some(ticks) = std::env::var("SPU_DEBOUNCE_TICKS").ok().and_then(|v| v.parse::<u8>().ok()) {
        debounce_ticks = ticks;
    }

    let mut spu = Spu::with_debounce_ticks(debounce_ticks);
    let mut env = SpuEnvironment::new(
        Box::new(InterruptController::new()),
        Box::new(NullDmaRequest),
        Box::new(NullAudioSink::new(4096)),
        Box::new(CdAudioFifo::default()),
    )
    .with_dump_writer(Box::new(WavDumpWriter::new()));

    if !env.dump_writer.as_mut().unwrap().open(&output, 44_100, 2) {
        error!("could not open '{}' for writing", output);
        return Err(SpuError::DumpOpenFailed { path: output, message: "open failed".into() });
    }
    spu.set_dump_enabled(true);

    let mut timing = TimingEventManager::new();
    let handle = timing.register_event("spu");

    const CONTROL_REG: u32 = 0x1F80_1DAA;
    const KEY_ON_LOW: u32 = 0x1F80_1C88;
    let voice_reg = |reg: u32| 0x1F80_1C00 + reg;

    spu.write_register(CONTROL_REG, 0x8000, &mut timing, handle, &mut env); // SPU enable
    spu.write_register(voice_reg(0x0), 0x3FFF, &mut timing, handle, &mut env); // voice 0 left volume
    spu.write_register(voice_reg(0x2), 0x3FFF, &mut timing, handle, &mut env); // voice 0 right volume
    spu.write_register(voice_reg(0x4), pitch, &mut timing, handle, &mut env); // voice 0 sample rate
    spu.write_register(voice_reg(0x8), 0x7F00, &mut timing, handle, &mut env); // fast linear attack, no release hold

    // Two-block square wave: full positive, then full negative, looping.
    write_adpcm_block(&mut spu, 0, 0x00, 0x04, &[15; 28]);
    write_adpcm_block(&mut spu, 1, 0x00, 0x03, &[1; 28]);

    spu.write_register(KEY_ON_LOW, 0x0001, &mut timing, handle, &mut env); // key on voice 0

    info!("rendering {frames} frames to {output}");
    let mut remaining = frames;
    while remaining > 0 {
        let batch = remaining.min(4096);
        let produced = spu.run_batch(batch, &mut env);
        remaining -= produced;
        if produced == 0 {
            break;
        }
    }

    env.dump_writer.as_mut().unwrap().close();

    info!("done");
    Ok(())
}
