#![no_main]

use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use shufflebox::audio::NullAudioEngine;
use shufflebox::config::StorePaths;
use shufflebox::core::PlayerCore;
use shufflebox::model::{MAX_VOLUME, Mode, Settings};
use shufflebox::scan::ScanPool;
use std::path::PathBuf;
use std::time::{Duration, Instant};

fuzz_target!(|data: &[u8]| {
    let home = std::env::temp_dir().join("shufflebox-fuzz");
    let len = (data.len() % 16).max(1);
    let settings = Settings {
        playlist: (0..len)
            .map(|idx| PathBuf::from(format!("/fuzz/track_{idx}.mp3")))
            .collect(),
        ..Settings::default()
    };
    let mut core = PlayerCore::new(
        StorePaths::rooted_at(home),
        settings,
        SmallRng::seed_from_u64(data.len() as u64),
        ScanPool::new(1),
    );
    let mut engine = NullAudioEngine::new();
    let start = Instant::now();

    for (step, byte) in data.iter().enumerate() {
        let now = start + Duration::from_secs(step as u64);
        match byte % 14 {
            0 => {
                core.toggle(Mode::ALL[usize::from(byte / 14) % Mode::ALL.len()], now);
            }
            1 => {
                core.skip(&mut engine);
            }
            2 => {
                core.previous(&mut engine);
            }
            3 => {
                core.pause(&mut engine);
            }
            4 => {
                core.resume(&mut engine);
            }
            5 => {
                core.save_current_song();
            }
            6 => core.shuffle_playlist(),
            7 => core.clear_playlist(),
            8 => {
                core.volume_up(&mut engine);
            }
            9 => {
                core.volume_down(&mut engine);
            }
            10 => {
                core.play_selected(&mut engine, usize::from(*byte));
            }
            11 => {
                core.search(&format!("{}", byte % 10));
            }
            12 => {
                core.drop_paths(&[PathBuf::from(format!("/fuzz/drop_{byte}.flac"))]);
            }
            _ => core.tick(&mut engine, now),
        }

        let session = core.session();
        assert!(session.volume() <= MAX_VOLUME);
        assert!(session.song_count() as usize <= session.history().len() + step + 1);
        if session.is_paused() {
            assert!(session.now_playing().is_some());
        }
        if let Some(playing) = session.now_playing() {
            assert_eq!(session.history().last().map(PathBuf::as_path), Some(playing));
        }
        if let Some(focus) = core.playlist().focus() {
            assert!(focus < core.playlist().len());
        }
    }
    core.shutdown(&mut engine);
});
