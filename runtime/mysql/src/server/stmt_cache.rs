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

use std::collections::HashMap;

use indexmap::IndexMap;
use mysql_protocol::value::ParamType;
use xsql_error::error::Error;

use crate::session::PreparedStatement;

pub struct CachedStatement {
    pub stmt: Box<dyn PreparedStatement>,
    // types bound by the last execute, reused when a client omits them
    pub param_types: Vec<ParamType>,
    // chunks of COM_STMT_SEND_LONG_DATA per parameter, consumed by the next execute
    pub long_data: HashMap<u16, Vec<u8>>,
}

impl CachedStatement {
    pub fn new(stmt: Box<dyn PreparedStatement>) -> Self {
        CachedStatement { stmt, param_types: vec![], long_data: HashMap::new() }
    }

    pub fn append_long_data(&mut self, param_id: u16, data: &[u8]) {
        self.long_data.entry(param_id).or_default().extend_from_slice(data);
    }

    /// Forgets the bound types and any streamed parameter data.
    pub fn reset(&mut self) {
        self.param_types.clear();
        self.long_data.clear();
    }
}

/// Prepared statements of one connection, keyed by the id handed to the client.
pub struct StmtCache {
    cache: IndexMap<u32, CachedStatement>,
    // highest id ever stored, ids are never handed out twice
    last_id: u32,
}

impl Default for StmtCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StmtCache {
    pub fn new() -> Self {
        Self { cache: IndexMap::new(), last_id: 0 }
    }

    /// Stores `stmt` under `id`. A rejected statement is closed.
    pub fn put(&mut self, id: u32, stmt: Box<dyn PreparedStatement>) -> Result<(), Error> {
        if id <= self.last_id {
            stmt.close();
            return Err(Error::internal(format!(
                "statement id {} is not greater than last issued id {}",
                id, self.last_id
            )));
        }

        self.last_id = id;
        self.cache.insert(id, CachedStatement::new(stmt));
        Ok(())
    }

    pub fn get(&self, id: u32, method: &str) -> Result<&CachedStatement, Error> {
        self.cache.get(&id).ok_or_else(|| Error::unknown_statement(id, method))
    }

    pub fn get_mut(&mut self, id: u32, method: &str) -> Result<&mut CachedStatement, Error> {
        self.cache.get_mut(&id).ok_or_else(|| Error::unknown_statement(id, method))
    }

    pub fn remove(&mut self, id: u32) -> Option<CachedStatement> {
        self.cache.remove(&id)
    }

    pub fn drain(&mut self) -> Vec<CachedStatement> {
        self.cache.drain(..).map(|(_, v)| v).collect()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use xsql_error::error::ErrorKind;

    use super::*;
    use crate::session::ColumnMeta;

    struct Stmt {
        closed: Arc<AtomicBool>,
    }

    impl PreparedStatement for Stmt {
        fn sql(&self) -> &str {
            "SELECT 1"
        }

        fn is_query(&self) -> bool {
            true
        }

        fn columns(&self) -> Vec<ColumnMeta> {
            vec![]
        }

        fn parameter_count(&self) -> usize {
            0
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst)
        }
    }

    fn stmt() -> Box<dyn PreparedStatement> {
        Box::new(Stmt { closed: Arc::new(AtomicBool::new(false)) })
    }

    #[test]
    fn test_put_get() {
        let mut cache = StmtCache::new();
        cache.put(1, stmt()).unwrap();
        cache.put(2, stmt()).unwrap();

        assert_eq!(cache.get(1, "execute").unwrap().stmt.sql(), "SELECT 1");
        assert_eq!(cache.len(), 2);

        let err = cache.get(3, "mysqld_stmt_execute").err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::UnknownStatement { id: 3, .. }));
    }

    #[test]
    fn test_put_reused_id() {
        let mut cache = StmtCache::new();
        cache.put(2, stmt()).unwrap();
        assert!(cache.put(2, stmt()).is_err());
        assert!(cache.put(1, stmt()).is_err());

        // closing does not free the id
        cache.remove(2);
        assert!(cache.put(2, stmt()).is_err());
        assert!(cache.put(3, stmt()).is_ok());
    }

    #[test]
    fn test_put_rejected_is_closed() {
        let closed = Arc::new(AtomicBool::new(false));
        let mut cache = StmtCache::new();
        cache.put(5, stmt()).unwrap();
        assert!(cache.put(5, Box::new(Stmt { closed: closed.clone() })).is_err());
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_long_data() {
        let mut cache = StmtCache::new();
        cache.put(1, stmt()).unwrap();

        let entry = cache.get_mut(1, "mysqld_stmt_send_long_data").unwrap();
        entry.append_long_data(0, b"hello ");
        entry.append_long_data(0, b"world");
        entry.append_long_data(2, b"x");
        assert_eq!(entry.long_data.get(&0).unwrap(), b"hello world");

        entry.reset();
        assert!(entry.long_data.is_empty());
        assert!(entry.param_types.is_empty());
    }

    #[test]
    fn test_remove_idempotent() {
        let mut cache = StmtCache::new();
        cache.put(1, stmt()).unwrap();
        assert!(cache.remove(1).is_some());
        assert!(cache.remove(1).is_none());
        assert!(cache.get_mut(1, "mysqld_stmt_reset").is_err());
    }

    #[test]
    fn test_drain() {
        let closed = Arc::new(AtomicBool::new(false));
        let mut cache = StmtCache::new();
        cache.put(1, Box::new(Stmt { closed: closed.clone() })).unwrap();
        cache.put(2, stmt()).unwrap();

        for entry in cache.drain() {
            entry.stmt.close();
        }

        assert!(cache.is_empty());
        assert!(closed.load(Ordering::SeqCst));
    }
}
