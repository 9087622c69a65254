// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sharing pictures and data sources across threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use vello_picture::data_source::{AsyncDataSource, DataSource, SyncDataSource};
use vello_picture::kurbo::{Affine, Rect};
use vello_picture::paint::Paint;

use crate::util::record;

fn busy_picture() -> Arc<vello_picture::Picture> {
    record(|canvas| {
        for i in 0..200 {
            let offset = f64::from(i);
            canvas.save();
            canvas.translate(offset, offset * 0.5);
            canvas.rotate(offset * 0.01);
            canvas.draw_rect(Rect::new(0.0, 0.0, 3.0, 2.0), &Paint::default());
            canvas.restore();
        }
    })
}

#[test]
fn concurrent_first_bounds_agree() {
    let picture = busy_picture();
    let expected = picture.compute_bounds(&Affine::IDENTITY, false);
    let threads = 8;
    let barrier = Barrier::new(threads);
    let results: Vec<Rect> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let picture = &picture;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    picture.bounds()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });
    for bounds in results {
        assert_eq!(bounds, expected, "every thread sees the published bounds");
    }
    assert_eq!(picture.bounds(), expected);
}

#[test]
fn pictures_play_back_on_other_threads() {
    let picture = busy_picture();
    let shared = Arc::clone(&picture);
    let bounds = std::thread::spawn(move || shared.compute_bounds(&Affine::scale(2.0), true))
        .join()
        .unwrap();
    let local = picture.compute_bounds(&Affine::scale(2.0), true);
    assert_eq!(bounds, local);
}

#[test]
fn async_source_runs_once() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let source = SyncDataSource::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Some(42_u32)
    });
    let source = AsyncDataSource::spawn(Arc::new(source)).unwrap();
    assert_eq!(source.get_data().as_deref(), Some(&42));
    assert_eq!(source.get_data().as_deref(), Some(&42));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
