//! Media automation worker
//!
//! Playback, skip and like operations can take hundreds of milliseconds
//! against desktop automation APIs, so they run on their own thread. The
//! control loop sends requests and polls replies over a channel pair; it
//! never blocks on the worker.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use anyhow::Result;
use log::{error, info};

pub trait MediaBackend: Send {
    /// Toggle play/pause, returning the new playing state
    fn toggle_playback(&mut self) -> Result<bool>;

    fn skip(&mut self, forward: bool) -> Result<()>;

    /// Toggle like on the current track, returning the new liked state
    fn like(&mut self) -> Result<bool>;
}

/// Backend that tracks state in memory but drives nothing
#[derive(Default)]
pub struct NullMedia {
    playing: bool,
    liked: bool,
}

impl MediaBackend for NullMedia {
    fn toggle_playback(&mut self) -> Result<bool> {
        self.playing = !self.playing;
        Ok(self.playing)
    }

    fn skip(&mut self, forward: bool) -> Result<()> {
        info!("Skip {}", if forward { "forward" } else { "backward" });
        Ok(())
    }

    fn like(&mut self) -> Result<bool> {
        self.liked = !self.liked;
        Ok(self.liked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaRequest {
    TogglePlayback,
    Skip { forward: bool },
    Like,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaReply {
    Playing(bool),
    Liked(bool),
}

/// Control-loop handle to the worker thread
pub struct MediaWorker {
    requests: Sender<MediaRequest>,
    replies: Receiver<MediaReply>,
    handle: Option<JoinHandle<()>>,
}

impl MediaWorker {
    pub fn spawn<B: MediaBackend + 'static>(mut backend: B) -> Self {
        let (req_tx, req_rx) = mpsc::channel::<MediaRequest>();
        let (rep_tx, rep_rx) = mpsc::channel::<MediaReply>();

        let handle = std::thread::spawn(move || {
            // Ends when the request sender is dropped
            for request in req_rx {
                let reply: Result<Option<MediaReply>> = match request {
                    MediaRequest::TogglePlayback => {
                        backend.toggle_playback().map(|p| Some(MediaReply::Playing(p)))
                    }
                    // Skips have no status to report back
                    MediaRequest::Skip { forward } => backend.skip(forward).map(|()| None),
                    MediaRequest::Like => backend.like().map(|l| Some(MediaReply::Liked(l))),
                };
                match reply {
                    Ok(Some(reply)) => {
                        if rep_tx.send(reply).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => error!("Media backend error: {:#}", e),
                }
            }
        });

        Self {
            requests: req_tx,
            replies: rep_rx,
            handle: Some(handle),
        }
    }

    /// Queue a request; the reply arrives via [`MediaWorker::try_recv`]
    pub fn request(&self, request: MediaRequest) {
        if self.requests.send(request).is_err() {
            error!("Media worker is gone, dropping {:?}", request);
        }
    }

    /// Non-blocking poll for one finished reply
    pub fn try_recv(&self) -> Option<MediaReply> {
        match self.replies.try_recv() {
            Ok(reply) => Some(reply),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for MediaWorker {
    fn drop(&mut self) {
        // Closing the request channel lets the thread finish its queue
        let (dead_tx, _) = mpsc::channel();
        self.requests = dead_tx;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn wait_reply(worker: &MediaWorker) -> MediaReply {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Some(reply) = worker.try_recv() {
                return reply;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("no reply from media worker");
    }

    #[test]
    fn test_toggle_round_trips_playing_state() {
        let worker = MediaWorker::spawn(NullMedia::default());
        worker.request(MediaRequest::TogglePlayback);
        assert_eq!(wait_reply(&worker), MediaReply::Playing(true));
        worker.request(MediaRequest::TogglePlayback);
        assert_eq!(wait_reply(&worker), MediaReply::Playing(false));
    }

    #[test]
    fn test_like_round_trips_liked_state() {
        let worker = MediaWorker::spawn(NullMedia::default());
        worker.request(MediaRequest::Like);
        assert_eq!(wait_reply(&worker), MediaReply::Liked(true));
    }
}
