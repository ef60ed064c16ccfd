//! Next-track selection.
//!
//! Precedence, first match wins:
//! 1. playlist-only with a non-empty playlist: playlist, cursor or random
//! 2. non-empty directory pool: directory, cursor or random
//! 3. repeat with a non-empty playlist: playlist, random
//! 4. whatever pool is non-empty, random
//!
//! The cursor is the running skip count taken modulo the pool length.

use crate::error::{PlayerError, Result};
use crate::model::{ModeFlags, PoolKind};
use rand::Rng;
use rand::seq::IteratorRandom;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub track: PathBuf,
    pub pool: PoolKind,
    pub index: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Pools<'a> {
    pub directory: &'a [PathBuf],
    pub playlist: &'a [PathBuf],
}

impl Pools<'_> {
    pub fn is_empty(&self) -> bool {
        self.directory.is_empty() && self.playlist.is_empty()
    }
}

pub fn select_next<R: Rng + ?Sized>(
    flags: &ModeFlags,
    pools: Pools<'_>,
    skip_count: u64,
    rng: &mut R,
) -> Result<Selection> {
    let Pools {
        directory,
        playlist,
    } = pools;

    if flags.playlist_only && !playlist.is_empty() {
        return Ok(if flags.playlist_only_not_random {
            sequential(PoolKind::Playlist, playlist, skip_count)
        } else {
            random(PoolKind::Playlist, playlist, rng)
        });
    }

    if !directory.is_empty() {
        return Ok(if flags.dir_select_not_random {
            sequential(PoolKind::Directory, directory, skip_count)
        } else {
            random(PoolKind::Directory, directory, rng)
        });
    }

    if !playlist.is_empty() {
        // Repeat and the plain fallback both draw at random here since the
        // directory pool is empty by now.
        return Ok(random(PoolKind::Playlist, playlist, rng));
    }

    Err(PlayerError::NoTracks)
}

fn sequential(pool: PoolKind, tracks: &[PathBuf], skip_count: u64) -> Selection {
    let index = (skip_count % tracks.len() as u64) as usize;
    Selection {
        track: tracks[index].clone(),
        pool,
        index,
    }
}

fn random<R: Rng + ?Sized>(pool: PoolKind, tracks: &[PathBuf], rng: &mut R) -> Selection {
    let index = (0..tracks.len()).choose(rng).unwrap_or_default();
    Selection {
        track: tracks[index].clone(),
        pool,
        index,
    }
}

pub fn pool_contains(tracks: &[PathBuf], track: &Path) -> bool {
    tracks.iter().any(|candidate| candidate == track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(0x5eed)
    }

    #[test]
    fn sequential_directory_wraps() {
        let directory = paths(&["A", "B", "C"]);
        let flags = ModeFlags {
            dir_select_not_random: true,
            ..ModeFlags::default()
        };
        let pools = Pools {
            directory: &directory,
            playlist: &[],
        };

        let picks: Vec<PathBuf> = (0..4)
            .map(|skip| {
                select_next(&flags, pools, skip, &mut rng())
                    .expect("select")
                    .track
            })
            .collect();
        assert_eq!(picks, paths(&["A", "B", "C", "A"]));
    }

    #[test]
    fn single_entry_playlist_only_always_returns_it() {
        let playlist = paths(&["x.mp3"]);
        let directory = paths(&["d1.mp3", "d2.mp3"]);
        let flags = ModeFlags {
            playlist_only: true,
            ..ModeFlags::default()
        };
        let pools = Pools {
            directory: &directory,
            playlist: &playlist,
        };
        let mut rng = rng();

        for skip in 0..50 {
            let pick = select_next(&flags, pools, skip, &mut rng).expect("select");
            assert_eq!(pick.track, PathBuf::from("x.mp3"));
            assert_eq!(pick.pool, PoolKind::Playlist);
        }
    }

    #[test]
    fn playlist_only_with_empty_playlist_uses_directory() {
        let directory = paths(&["d.mp3"]);
        let flags = ModeFlags {
            playlist_only: true,
            playlist_only_not_random: true,
            ..ModeFlags::default()
        };
        let pools = Pools {
            directory: &directory,
            playlist: &[],
        };
        let pick = select_next(&flags, pools, 3, &mut rng()).expect("select");
        assert_eq!(pick.pool, PoolKind::Directory);
    }

    #[test]
    fn repeat_draws_from_playlist_when_directory_is_empty() {
        let playlist = paths(&["p1", "p2"]);
        let flags = ModeFlags {
            repeat: true,
            ..ModeFlags::default()
        };
        let pools = Pools {
            directory: &[],
            playlist: &playlist,
        };
        let pick = select_next(&flags, pools, 0, &mut rng()).expect("select");
        assert_eq!(pick.pool, PoolKind::Playlist);
    }

    #[test]
    fn empty_pools_are_no_tracks() {
        let pools = Pools {
            directory: &[],
            playlist: &[],
        };
        let err = select_next(&ModeFlags::default(), pools, 0, &mut rng()).expect_err("empty");
        assert!(matches!(err, PlayerError::NoTracks));
    }

    #[test]
    fn random_mode_does_not_starve_any_track() {
        let directory = paths(&["a", "b", "c", "d"]);
        let pools = Pools {
            directory: &directory,
            playlist: &[],
        };
        let mut rng = rng();
        let mut counts = [0_u32; 4];
        let trials = 8_000;

        for skip in 0..trials {
            let pick = select_next(&ModeFlags::default(), pools, skip, &mut rng).expect("select");
            counts[pick.index] += 1;
        }

        let expected = trials as f64 / 4.0;
        for count in counts {
            let deviation = (f64::from(count) - expected).abs() / expected;
            assert!(deviation < 0.1, "counts skewed: {counts:?}");
        }
    }

    fn flags_strategy() -> impl Strategy<Value = ModeFlags> {
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
            |(repeat, playlist_only, playlist_only_not_random, dir_select_not_random)| ModeFlags {
                repeat,
                playlist_only,
                playlist_only_not_random,
                dir_select_not_random,
            },
        )
    }

    proptest! {
        #[test]
        fn selection_comes_from_the_claimed_pool(
            flags in flags_strategy(),
            dir_len in 0usize..6,
            playlist_len in 0usize..6,
            skip in 0u64..1_000,
            seed in any::<u64>(),
        ) {
            let directory: Vec<PathBuf> = (0..dir_len).map(|n| PathBuf::from(format!("dir/{n}"))).collect();
            let playlist: Vec<PathBuf> = (0..playlist_len).map(|n| PathBuf::from(format!("pl/{n}"))).collect();
            let pools = Pools { directory: &directory, playlist: &playlist };
            let mut rng = SmallRng::seed_from_u64(seed);

            match select_next(&flags, pools, skip, &mut rng) {
                Ok(pick) => {
                    let source = match pick.pool {
                        PoolKind::Directory => &directory,
                        PoolKind::Playlist => &playlist,
                    };
                    prop_assert!(pool_contains(source, &pick.track));
                    prop_assert_eq!(&source[pick.index], &pick.track);
                }
                Err(err) => {
                    prop_assert!(matches!(err, PlayerError::NoTracks));
                    prop_assert!(pools.is_empty());
                }
            }
        }

        #[test]
        fn sequential_cycle_visits_each_index_once(len in 1usize..20, start in 0u64..500) {
            let playlist: Vec<PathBuf> = (0..len).map(|n| PathBuf::from(format!("{n}"))).collect();
            let flags = ModeFlags { playlist_only: true, playlist_only_not_random: true, ..ModeFlags::default() };
            let pools = Pools { directory: &[], playlist: &playlist };
            let mut rng = SmallRng::seed_from_u64(1);

            let visited: Vec<usize> = (start..start + len as u64)
                .map(|skip| select_next(&flags, pools, skip, &mut rng).map(|pick| pick.index))
                .collect::<Result<_>>()
                .expect("non-empty pool");

            for (offset, index) in visited.iter().enumerate() {
                prop_assert_eq!(*index, ((start as usize) + offset) % len);
            }
            let mut sorted = visited.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), len);
        }
    }
}
