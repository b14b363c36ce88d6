//! In-memory stand-in for a PostgreSQL cluster, for lock tests.
//!
//! A [`FakeServer`] keeps the catalog (table oids, whether the lock registry
//! exists), the advisory lock table, the registry rows, and one backend entry
//! per connected session. Each [`FakeSession`] answers the lock statements by
//! their [`Statement`] tag with the same columns the real SQL returns.

use crate::config::Config;
use crate::db::{Query, Row, Session, Statement, Value};
use crate::error::BackendError;
use crate::locks::LockContext;
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

const FIRST_TABLE_OID: i64 = 16384;
const FIRST_PID: i64 = 4000;

struct Backend {
    user: String,
    application_name: String,
    alive: bool,
}

struct RegistryRow {
    table_oid: i64,
    record_id: i64,
    pid: i64,
    username: String,
    since: DateTime<Utc>,
}

#[derive(Default)]
struct ServerState {
    tables: Vec<(String, i64)>,
    registry: Option<(String, String)>,
    backends: BTreeMap<i64, Backend>,
    next_pid: i64,
    advisory: BTreeMap<(i64, i64), i64>,
    registry_rows: Vec<RegistryRow>,
    statements: Vec<Statement>,
    failures: Vec<(Statement, BackendError)>,
}

impl ServerState {
    /// `to_regclass` for unqualified or `public.`-qualified names.
    fn table_oid(&self, name: Option<&str>) -> Option<i64> {
        let name = name?;
        let name = name.strip_prefix("public.").unwrap_or(name);
        self.tables
            .iter()
            .find(|(table, _)| table == name)
            .map(|(_, oid)| *oid)
    }

    fn table_name(&self, oid: i64) -> String {
        self.tables
            .iter()
            .find(|(_, table_oid)| *table_oid == oid)
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    }

    fn alive(&self, pid: i64) -> bool {
        self.backends.get(&pid).is_some_and(|b| b.alive)
    }

    fn user(&self, pid: i64) -> Option<String> {
        self.backends
            .get(&pid)
            .filter(|b| b.alive)
            .map(|b| b.user.clone())
    }

    fn application_name(&self, pid: i64) -> Option<String> {
        self.backends
            .get(&pid)
            .filter(|b| b.alive)
            .map(|b| b.application_name.clone())
    }

    fn key(&self, query: &Query) -> Option<(i64, i64)> {
        let oid = self.table_oid(query.text_param(0))?;
        let id = query.int_param(1)?;
        Some((oid, id))
    }

    fn require_registry(&self, what: &str) -> Result<(), BackendError> {
        if self.registry.is_some() {
            Ok(())
        } else {
            Err(BackendError::new(format!("{} does not exist", what)).with_code("42P01"))
        }
    }

    fn run(&mut self, pid: i64, query: &Query) -> Result<Vec<Row>, BackendError> {
        if !self.alive(pid) {
            return Err(BackendError::closed());
        }

        self.statements.push(query.statement);
        if let Some(pos) = self
            .failures
            .iter()
            .position(|(statement, _)| *statement == query.statement)
        {
            return Err(self.failures.remove(pos).1);
        }

        match query.statement {
            Statement::ProbeRegistry => {
                let schema = query.text_param(0).unwrap_or_default().to_string();
                let table = query.text_param(1).unwrap_or_default().to_string();
                let exists = self.registry.as_ref() == Some(&(schema, table));
                Ok(vec![Row::new().with("registry_exists", exists)])
            }

            Statement::AdvisoryTryLock => {
                let Some(key) = self.key(query) else {
                    return Ok(vec![]);
                };
                let locked = if self.advisory.contains_key(&key) {
                    false
                } else {
                    self.advisory.insert(key, pid);
                    true
                };
                Ok(vec![Row::new().with("locked", locked)])
            }

            Statement::AdvisoryOwnership => {
                let holder = self
                    .key(query)
                    .and_then(|key| self.advisory.get(&key).copied());
                Ok(holder
                    .into_iter()
                    .map(|holder| self.ownership_row(pid, holder))
                    .collect())
            }

            Statement::AdvisoryUnlock => {
                let Some(key) = self.key(query) else {
                    return Ok(vec![]);
                };
                let released = self.advisory.get(&key) == Some(&pid);
                if released {
                    self.advisory.remove(&key);
                }
                Ok(vec![Row::new().with("released", released)])
            }

            Statement::AdvisoryList => Ok(self
                .advisory
                .iter()
                .map(|(&(oid, id), &holder)| {
                    self.list_row(pid, oid, id, holder, Option::<DateTime<Utc>>::None)
                })
                .collect()),

            Statement::RegistryTryLock => {
                if self.registry.is_none() {
                    return Err(
                        BackendError::new("function xt.trylock(oid, integer) does not exist")
                            .with_code("42883"),
                    );
                }
                let Some((oid, id)) = self.key(query) else {
                    return Ok(vec![]);
                };

                let live: Vec<i64> = self
                    .backends
                    .iter()
                    .filter(|(_, b)| b.alive)
                    .map(|(pid, _)| *pid)
                    .collect();
                self.registry_rows.retain(|row| {
                    !(row.table_oid == oid && row.record_id == id && !live.contains(&row.pid))
                });

                let taken = self
                    .registry_rows
                    .iter()
                    .any(|row| row.table_oid == oid && row.record_id == id);
                if !taken {
                    let username = self.user(pid).unwrap_or_default();
                    self.registry_rows.push(RegistryRow {
                        table_oid: oid,
                        record_id: id,
                        pid,
                        username,
                        since: Utc::now(),
                    });
                }
                Ok(vec![Row::new().with("locked", !taken)])
            }

            Statement::RegistryOwnership => {
                self.require_registry("relation \"xt.lock\"")?;
                let Some((oid, id)) = self.key(query) else {
                    return Ok(vec![]);
                };
                Ok(self
                    .registry_rows
                    .iter()
                    .filter(|row| row.table_oid == oid && row.record_id == id)
                    .filter(|row| self.alive(row.pid))
                    .map(|row| self.ownership_row(pid, row.pid))
                    .take(1)
                    .collect())
            }

            Statement::RegistryUnlock => {
                self.require_registry("relation \"xt.lock\"")?;
                let Some((oid, id)) = self.key(query) else {
                    return Ok(vec![]);
                };
                let before = self.registry_rows.len();
                self.registry_rows.retain(|row| {
                    !(row.table_oid == oid && row.record_id == id && row.pid == pid)
                });
                if self.registry_rows.len() < before {
                    Ok(vec![Row::new().with("released", true)])
                } else {
                    Ok(vec![])
                }
            }

            Statement::RegistryList => {
                self.require_registry("relation \"xt.lock\"")?;
                Ok(self
                    .registry_rows
                    .iter()
                    .filter(|row| self.alive(row.pid))
                    .map(|row| self.list_row(pid, row.table_oid, row.record_id, row.pid, row.since))
                    .collect())
            }

            Statement::RegistryClear => {
                self.require_registry("relation \"xt.lock\"")?;
                let Some((oid, id)) = self.key(query) else {
                    return Ok(vec![]);
                };
                let Some(pos) = self
                    .registry_rows
                    .iter()
                    .position(|row| row.table_oid == oid && row.record_id == id)
                else {
                    return Ok(vec![]);
                };
                let row = self.registry_rows.remove(pos);
                Ok(vec![
                    Row::new()
                        .with("table_name", self.table_name(row.table_oid))
                        .with("record_id", row.record_id)
                        .with("holder", row.username)
                        .with("holder_pid", row.pid)
                        .with("application_name", Value::Null)
                        .with("held_by_me", row.pid == pid)
                        .with("since", row.since),
                ])
            }

            Statement::RegistryInstall => {
                if query.sql.contains("CREATE TABLE") {
                    let parts: Vec<&str> = query.sql.split('"').collect();
                    if parts.len() > 3 {
                        self.registry = Some((parts[1].to_string(), parts[3].to_string()));
                    }
                }
                Ok(vec![])
            }
        }
    }

    fn ownership_row(&self, pid: i64, holder: i64) -> Row {
        Row::new()
            .with("held_by_me", holder == pid)
            .with("holder", self.user(holder))
            .with("holder_pid", holder)
    }

    fn list_row(
        &self,
        pid: i64,
        oid: i64,
        id: i64,
        holder: i64,
        since: impl Into<Value>,
    ) -> Row {
        Row::new()
            .with("table_name", self.table_name(oid))
            .with("record_id", id)
            .with("holder", self.user(holder))
            .with("holder_pid", holder)
            .with("application_name", self.application_name(holder))
            .with("held_by_me", holder == pid)
            .with("since", since)
    }
}

/// A simulated database cluster shared by several sessions.
#[derive(Clone)]
pub(crate) struct FakeServer {
    state: Rc<RefCell<ServerState>>,
}

impl FakeServer {
    /// A cluster with tables `item`, `custinfo` and `cohead`, without the
    /// lock registry.
    pub(crate) fn new() -> Self {
        let state = ServerState {
            next_pid: FIRST_PID,
            ..ServerState::default()
        };
        let server = Self {
            state: Rc::new(RefCell::new(state)),
        };
        for table in ["item", "custinfo", "cohead"] {
            server.add_table(table);
        }
        server
    }

    /// Same cluster with the `xt.lock` registry installed.
    pub(crate) fn with_registry() -> Self {
        let server = Self::new();
        server.state.borrow_mut().registry = Some(("xt".to_string(), "lock".to_string()));
        server
    }

    pub(crate) fn add_table(&self, name: &str) -> i64 {
        let mut state = self.state.borrow_mut();
        let oid = FIRST_TABLE_OID + state.tables.len() as i64;
        state.tables.push((name.to_string(), oid));
        oid
    }

    /// Open a new session for `user`.
    pub(crate) fn connect(&self, user: &str) -> FakeSession {
        let mut state = self.state.borrow_mut();
        let pid = state.next_pid;
        state.next_pid += 1;
        state.backends.insert(
            pid,
            Backend {
                user: user.to_string(),
                application_name: format!("recordlock@{}", user),
                alive: true,
            },
        );
        FakeSession {
            state: Rc::clone(&self.state),
            pid,
        }
    }

    /// Open a session for `user` and resolve a lock context with `config`.
    pub(crate) fn client_with(&self, user: &str, config: &Config) -> FakeClient {
        let session = self.connect(user);
        let pid = session.pid();
        let session: Rc<RefCell<dyn Session>> = Rc::new(RefCell::new(session));
        let ctx = LockContext::resolve(session, config).unwrap();
        FakeClient { ctx, pid }
    }

    /// Open a session for `user` with the default (auto-detecting) config.
    pub(crate) fn client(&self, user: &str) -> FakeClient {
        self.client_with(user, &Config::default())
    }

    /// End a session the way a crashed client would: its advisory locks go,
    /// its registry rows stay behind.
    pub(crate) fn terminate(&self, pid: i64) {
        let mut state = self.state.borrow_mut();
        if let Some(backend) = state.backends.get_mut(&pid) {
            backend.alive = false;
        }
        state.advisory.retain(|_, holder| *holder != pid);
    }

    /// Make the next statement of kind `statement` fail with `message`.
    pub(crate) fn fail_next(&self, statement: Statement, message: &str) {
        self.state
            .borrow_mut()
            .failures
            .push((statement, BackendError::new(message)));
    }

    /// Total statements run against the cluster.
    pub(crate) fn statement_count(&self) -> usize {
        self.state.borrow().statements.len()
    }

    /// Statements of one kind run against the cluster.
    pub(crate) fn count(&self, statement: Statement) -> usize {
        self.state
            .borrow()
            .statements
            .iter()
            .filter(|s| **s == statement)
            .count()
    }

    /// Pid holding the advisory lock on `table` / `id`.
    pub(crate) fn advisory_holder(&self, table: &str, id: i64) -> Option<i64> {
        let state = self.state.borrow();
        let oid = state.table_oid(Some(table))?;
        state.advisory.get(&(oid, id)).copied()
    }

    /// Number of registry rows, live or stale.
    pub(crate) fn registry_rows(&self) -> usize {
        self.state.borrow().registry_rows.len()
    }
}

/// A session opened on a [`FakeServer`].
pub(crate) struct FakeSession {
    state: Rc<RefCell<ServerState>>,
    pid: i64,
}

impl FakeSession {
    pub(crate) fn pid(&self) -> i64 {
        self.pid
    }
}

impl Session for FakeSession {
    fn is_open(&self) -> bool {
        self.state.borrow().alive(self.pid)
    }

    fn fetch_optional(&mut self, query: &Query) -> Result<Option<Row>, BackendError> {
        Ok(self.state.borrow_mut().run(self.pid, query)?.into_iter().next())
    }

    fn fetch_all(&mut self, query: &Query) -> Result<Vec<Row>, BackendError> {
        self.state.borrow_mut().run(self.pid, query)
    }

    fn execute(&mut self, query: &Query) -> Result<u64, BackendError> {
        Ok(self.state.borrow_mut().run(self.pid, query)?.len() as u64)
    }
}

/// A lock context plus the pid of its session.
pub(crate) struct FakeClient {
    pub(crate) ctx: LockContext,
    pub(crate) pid: i64,
}
