// Copyright 2022 SphereEx Authors
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

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEntry {
    pub peer_addr: Option<SocketAddr>,
    pub user: Option<String>,
}

/// Live connections of a server, shared by the listener and every
/// connection task.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<HashMap<u32, ConnectionEntry>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: u32, peer_addr: Option<SocketAddr>) {
        self.inner.lock().insert(id, ConnectionEntry { peer_addr, user: None });
    }

    pub fn set_user(&self, id: u32, user: &str) {
        if let Some(entry) = self.inner.lock().get_mut(&id) {
            entry.user = Some(user.to_string());
        }
    }

    pub fn deregister(&self, id: u32) -> Option<ConnectionEntry> {
        self.inner.lock().remove(&id)
    }

    pub fn get(&self, id: u32) -> Option<ConnectionEntry> {
        self.inner.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.inner.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
