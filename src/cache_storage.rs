use anyhow::Result;
use reqwest::Method;
use rusqlite::{Connection, OptionalExtension, Row};
use std::cmp::Ordering;
use std::path::Path;

use crate::network::{Network, Request, Response, ResponseType};

/* Persistent request -> response store, grouped into named caches.

`cache_names` keeps every cache ever opened, in creation order (`id`), which
is also the order `CacheStorage::match_request` searches them in.

`cache_entries` keeps the responses. A cache only grows: entries are replaced
by a newer `put` of the same request, and go away when the whole cache is
deleted. There is no eviction.
*/

pub const TARGET_VERSION: i32 = 1;

pub const DB_FILE_NAME: &str = "cache_storage.db";

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS `cache_names` (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS `cache_entries` (
        cache_id INTEGER NOT NULL,
        method TEXT NOT NULL,
        url TEXT NOT NULL,
        status INTEGER NOT NULL,
        headers TEXT NOT NULL,
        body BLOB NOT NULL,
        response_type TEXT NOT NULL,
        PRIMARY KEY(cache_id, method, url)
    );";

fn init_db(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "CREATE TABLE IF NOT EXISTS `db_metadata` (
            `key` TEXT NOT NULL,
            `value` TEXT,
            PRIMARY KEY(`key`)
        )",
        (),
    )?;
    let version_str: Option<String> = tx
        .query_row(
            "SELECT `value` FROM `db_metadata` WHERE key='version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let version = match version_str {
        None => 0,
        Some(s) => s.parse()?,
    };

    debug!(
        "current version = {}, target_version = {}",
        version, TARGET_VERSION
    );
    match version.cmp(&TARGET_VERSION) {
        Ordering::Equal => (),
        Ordering::Less => {
            // nothing worth migrating, older layouts are simply dropped
            tx.execute_batch(
                "DROP TABLE IF EXISTS cache_entries;
                 DROP TABLE IF EXISTS cache_names;",
            )?;
            tx.execute(
                "INSERT OR REPLACE INTO `db_metadata` (key, value) VALUES (?1, ?2)",
                ("version", TARGET_VERSION.to_string()),
            )?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                TARGET_VERSION
            );
        }
    }

    tx.execute_batch(SCHEMA_SQL)?;
    tx.commit()?;
    Ok(())
}

fn response_type_to_str(response_type: ResponseType) -> &'static str {
    match response_type {
        ResponseType::Basic => "basic",
        ResponseType::Cors => "cors",
    }
}

fn response_type_from_str(s: &str) -> Result<ResponseType> {
    match s {
        "basic" => Ok(ResponseType::Basic),
        "cors" => Ok(ResponseType::Cors),
        _ => bail!("invalid response type: {}", s),
    }
}

type RawEntry = (String, u16, String, Vec<u8>, String);

fn read_raw_entry(row: &Row) -> rusqlite::Result<RawEntry> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn to_response((url, status, headers, body, response_type): RawEntry) -> Result<Response> {
    Ok(Response {
        url,
        status,
        headers: serde_json::from_str(&headers)?,
        body,
        response_type: response_type_from_str(&response_type)?,
    })
}

pub struct CacheStorage {
    conn: Connection,
}

impl CacheStorage {
    pub fn open(cache_dir: &str) -> Result<CacheStorage> {
        debug!("opening cache storage in {}", cache_dir);
        let mut conn = Connection::open(Path::new(cache_dir).join(DB_FILE_NAME))?;
        init_db(&mut conn)?;
        Ok(CacheStorage { conn })
    }

    pub fn open_in_memory() -> Result<CacheStorage> {
        let mut conn = Connection::open_in_memory()?;
        init_db(&mut conn)?;
        Ok(CacheStorage { conn })
    }

    /// Returns the cache with this name, creating it if needed.
    pub fn open_cache(&self, name: &str) -> Result<Cache<'_>> {
        self.conn.execute(
            "INSERT OR IGNORE INTO `cache_names` (name) VALUES (?1)",
            (name,),
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM `cache_names` WHERE name = ?1",
            (name,),
            |row| row.get(0),
        )?;
        Ok(Cache {
            storage: self,
            id,
            name: name.to_string(),
        })
    }

    pub fn has(&self, name: &str) -> Result<bool> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM `cache_names` WHERE name = ?1",
                (name,),
                |row| row.get(0),
            )
            .optional()?;
        Ok(id.is_some())
    }

    /// Cache names in creation order.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut query = self
            .conn
            .prepare("SELECT name FROM `cache_names` ORDER BY id;")?;
        let names = query
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Returns `false` if there was no such cache.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM `cache_entries` WHERE cache_id IN
                (SELECT id FROM `cache_names` WHERE name = ?1);",
            (name,),
        )?;
        let deleted = tx.execute("DELETE FROM `cache_names` WHERE name = ?1;", (name,))?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Looks through every cache, oldest first.
    pub fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        if request.method != Method::GET {
            return Ok(None);
        }
        let sql = "SELECT e.url, e.status, e.headers, e.body, e.response_type
            FROM `cache_entries` e JOIN `cache_names` n ON e.cache_id = n.id
            WHERE e.method = ?1 AND e.url = ?2
            ORDER BY n.id LIMIT 1;";
        let mut query = self.conn.prepare(sql)?;
        query
            .query_row((request.method.as_str(), &request.url), read_raw_entry)
            .optional()?
            .map(to_response)
            .transpose()
    }
}

pub struct Cache<'a> {
    storage: &'a CacheStorage,
    id: i64,
    name: String,
}

impl Cache<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn put(&self, request: &Request, response: &Response) -> Result<()> {
        put_entry(&self.storage.conn, self.id, request, response)
    }

    pub fn match_request(&self, request: &Request) -> Result<Option<Response>> {
        if request.method != Method::GET {
            return Ok(None);
        }
        let sql = "SELECT url, status, headers, body, response_type FROM `cache_entries`
            WHERE cache_id = ?1 AND method = ?2 AND url = ?3;";
        let mut query = self.storage.conn.prepare(sql)?;
        query
            .query_row(
                (self.id, request.method.as_str(), &request.url),
                read_raw_entry,
            )
            .optional()?
            .map(to_response)
            .transpose()
    }

    pub fn delete_entry(&self, request: &Request) -> Result<bool> {
        let deleted = self.storage.conn.execute(
            "DELETE FROM `cache_entries` WHERE cache_id = ?1 AND method = ?2 AND url = ?3;",
            (self.id, request.method.as_str(), &request.url),
        )?;
        Ok(deleted > 0)
    }

    pub fn keys(&self) -> Result<Vec<Request>> {
        let mut query = self.storage.conn.prepare(
            "SELECT method, url FROM `cache_entries` WHERE cache_id = ?1 ORDER BY rowid;",
        )?;
        let rows = query
            .query_map((self.id,), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(method, url)| -> Result<Request> {
                Ok(Request {
                    method: Method::from_bytes(method.as_bytes())?,
                    url,
                })
            })
            .collect()
    }

    /// Fetches every request and stores the results in one transaction. If any
    /// fetch fails or is not ok, nothing is stored.
    pub fn add_all<N: Network + ?Sized>(
        &self,
        requests: &[Request],
        network: &N,
    ) -> Result<()> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            let response = network.fetch(request)?;
            if !response.is_ok() {
                bail!(
                    "failed to add {} to cache {}: status {}",
                    request.url,
                    self.name,
                    response.status
                );
            }
            responses.push(response);
        }

        let tx = self.storage.conn.unchecked_transaction()?;
        for (request, response) in requests.iter().zip(responses.iter()) {
            put_entry(&tx, self.id, request, response)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn put_entry(
    conn: &Connection,
    cache_id: i64,
    request: &Request,
    response: &Response,
) -> Result<()> {
    if request.method != Method::GET {
        bail!("only GET requests can be cached, got {}", request.method);
    }
    conn.execute(
        "INSERT OR REPLACE INTO `cache_entries`
            (cache_id, method, url, status, headers, body, response_type)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            cache_id,
            request.method.as_str(),
            &request.url,
            response.status,
            serde_json::to_string(&response.headers)?,
            &response.body,
            response_type_to_str(response.response_type),
        ),
    )?;
    Ok(())
}
