// Copyright (C) 2026 The grange authors. This program is free software: you
// can redistribute it and/or modify it under the terms of the GNU General
// Public License as published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The narrow interfaces the host implements for us. The kernel touches
//! connections only through these; everything network-shaped (listeners,
//! login, buffering policy) lives on the other side.

use std::sync::Arc;

use thiserror::Error;

use grange_var::Objid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No connection for player {0}")]
    NoConnection(Objid),
    #[error("Could not deliver to player {0}")]
    DeliveryFailure(Objid),
}

/// One live connection, as the kernel sees it.
pub trait Connection: Send + Sync {
    /// Deliver a line immediately.
    fn send(&self, msg: &str) -> Result<(), SessionError>;
    /// Queue a line for a later flush.
    fn buffer(&self, msg: &str);
    fn flush(&self) -> Result<(), SessionError>;
    fn remote_addr(&self) -> String;
    fn idle_seconds(&self) -> f64;
    fn connected_seconds(&self) -> f64;
}

/// The host's connection table.
pub trait ConnectionManager: Send + Sync {
    fn get_connection(&self, player: Objid) -> Option<Arc<dyn Connection>>;
    /// Players with live connections; `show_all` includes connections still
    /// in the login phase.
    fn connected_players(&self, show_all: bool) -> Vec<Objid>;
    fn boot_player(&self, player: Objid) -> Result<(), SessionError>;
    fn switch_player(&self, old: Objid, new: Objid) -> Result<(), SessionError>;
    fn listen_port(&self) -> u16;
}

/// Injects an input line into the host's command dispatcher without going
/// through the wire; backs `force_input()`.
pub trait InputForcer: Send + Sync {
    fn force_input(&self, player: Objid, line: &str, at_front: bool)
        -> Result<(), SessionError>;
}

/// A connection manager with nobody home: `notify` silently succeeds,
/// listings are empty. Backs tests and headless operation.
pub struct NoopConnectionManager;

impl ConnectionManager for NoopConnectionManager {
    fn get_connection(&self, _player: Objid) -> Option<Arc<dyn Connection>> {
        None
    }

    fn connected_players(&self, _show_all: bool) -> Vec<Objid> {
        vec![]
    }

    fn boot_player(&self, player: Objid) -> Result<(), SessionError> {
        Err(SessionError::NoConnection(player))
    }

    fn switch_player(&self, old: Objid, _new: Objid) -> Result<(), SessionError> {
        Err(SessionError::NoConnection(old))
    }

    fn listen_port(&self) -> u16 {
        0
    }
}

/// A connection that spools everything into memory; used by tests to watch
/// `notify` traffic.
#[derive(Default)]
pub struct BufferingConnection {
    lines: std::sync::Mutex<Vec<String>>,
}

impl BufferingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Connection for BufferingConnection {
    fn send(&self, msg: &str) -> Result<(), SessionError> {
        self.lines.lock().unwrap().push(msg.to_string());
        Ok(())
    }

    fn buffer(&self, msg: &str) {
        self.lines.lock().unwrap().push(msg.to_string());
    }

    fn flush(&self) -> Result<(), SessionError> {
        Ok(())
    }

    fn remote_addr(&self) -> String {
        "test:0".to_string()
    }

    fn idle_seconds(&self) -> f64 {
        0.0
    }

    fn connected_seconds(&self) -> f64 {
        0.0
    }
}

/// A one-player connection manager around a `BufferingConnection`.
pub struct SinglePlayerManager {
    player: Objid,
    connection: Arc<BufferingConnection>,
}

impl SinglePlayerManager {
    pub fn new(player: Objid) -> Self {
        Self {
            player,
            connection: BufferingConnection::new(),
        }
    }

    pub fn connection(&self) -> Arc<BufferingConnection> {
        self.connection.clone()
    }
}

impl ConnectionManager for SinglePlayerManager {
    fn get_connection(&self, player: Objid) -> Option<Arc<dyn Connection>> {
        (player == self.player).then(|| self.connection.clone() as Arc<dyn Connection>)
    }

    fn connected_players(&self, _show_all: bool) -> Vec<Objid> {
        vec![self.player]
    }

    fn boot_player(&self, player: Objid) -> Result<(), SessionError> {
        if player == self.player {
            Ok(())
        } else {
            Err(SessionError::NoConnection(player))
        }
    }

    fn switch_player(&self, _old: Objid, _new: Objid) -> Result<(), SessionError> {
        Ok(())
    }

    fn listen_port(&self) -> u16 {
        7777
    }
}
