//! `profile`: each input line is the current content of the name field; the
//! snapshot is shown once typing pauses.

use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use astromind_client::{ProfileDebouncer, ProfileSnapshot, ProfileStore};

pub async fn watch_profiles<R>(
    input: R,
    store: Arc<ProfileStore>,
    debouncer: Arc<ProfileDebouncer>,
) -> anyhow::Result<Vec<(String, ProfileSnapshot)>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut pending = Vec::new();

    while let Some(line) = lines.next_line().await? {
        pending.push(debouncer.spawn_load(store.clone(), line));
    }

    let mut loaded = Vec::new();
    for task in pending {
        if let Some((name, snapshot)) = task.await? {
            println!(
                "{}: {} {} ({}, {}) {}",
                name, snapshot.date, snapshot.time, snapshot.lat, snapshot.lon, snapshot.selected_city
            );
            loaded.push((name, snapshot));
        }
    }
    Ok(loaded)
}
