//! Command handler for the RESP control surface

use std::sync::Arc;
use serde_json::json;
use tracing::warn;

use reelcache::{Page, PageKey, PageSource, Record};
use crate::catalog::CatalogSource;
use crate::feed::FeedController;
use crate::player::SimulatedPlayer;
use crate::resp::Frame;

pub struct CommandHandler {
    feed: FeedController<SimulatedPlayer>,
    catalog: Arc<CatalogSource>,
}

impl CommandHandler {
    pub fn new(feed: FeedController<SimulatedPlayer>, catalog: Arc<CatalogSource>) -> Self {
        Self { feed, catalog }
    }

    pub async fn handle(&self, frame: Frame) -> Frame {
        let words = match frame.into_words() {
            Ok(words) => words,
            Err(e) => return Frame::err(e),
        };
        let command = words[0].to_uppercase();
        let args = &words[1..];

        match command.as_str() {
            "PING" => self.handle_ping(args),
            "FOCUS" => self.handle_focus(args).await,
            "ACTIVATE" => self.handle_activate(args, true).await,
            "PRELOAD" => self.handle_activate(args, false).await,
            "PAUSEALL" => self.handle_pause_all(args),
            "TEARDOWN" => self.handle_teardown(args).await,
            "FAILED" => self.handle_failed(args),
            "STATE" => self.handle_state(args),
            "PAGE" => self.handle_page(args).await,
            "RECORD" => self.handle_record(args).await,
            "LIKE" => self.handle_like(args, true).await,
            "UNLIKE" => self.handle_like(args, false).await,
            "ISLIKED" => self.handle_is_liked(args),
            "FLUSH" => self.handle_flush(args),
            "INVALIDATE" => self.handle_invalidate(args),
            "OUTAGE" => self.handle_outage(args),
            "INFO" => self.handle_info(),
            "COMMAND" => Frame::Array(Some(vec![])),
            _ => Frame::err(format!("unknown command '{}'", words[0])),
        }
    }

    fn handle_ping(&self, args: &[String]) -> Frame {
        match args {
            [] => Frame::Simple("PONG".to_string()),
            [message] => Frame::text(message.clone()),
            _ => wrong_arity("ping"),
        }
    }

    async fn handle_focus(&self, args: &[String]) -> Frame {
        let position = match one_position(args, "focus") {
            Ok(position) => position,
            Err(reply) => return reply,
        };

        let report = self.feed.focus(position).await;
        let body = json!({
            "position": report.position,
            "record": report.record.as_ref().map(|r| r.id.as_str()),
            "outcome": report.outcome.map(|o| o.to_string()),
        });
        Frame::text(body.to_string())
    }

    async fn handle_activate(&self, args: &[String], play: bool) -> Frame {
        let name = if play { "activate" } else { "preload" };
        let position = match one_position(args, name) {
            Ok(position) => position,
            Err(reply) => return reply,
        };

        let outcome = if play {
            self.feed.activate(position).await
        } else {
            self.feed.preload(position).await
        };
        match outcome {
            Some(outcome) => Frame::Simple(outcome.to_string()),
            None => Frame::err(format!("no record at position {}", position)),
        }
    }

    fn handle_pause_all(&self, args: &[String]) -> Frame {
        match args {
            [] => {
                self.feed.pool().pause_all();
                Frame::ok()
            }
            [except] => match except.parse::<i64>() {
                Ok(position) => {
                    self.feed.pool().pause_all_except(position);
                    Frame::ok()
                }
                Err(_) => Frame::err("position is not an integer"),
            },
            _ => wrong_arity("pauseall"),
        }
    }

    async fn handle_teardown(&self, args: &[String]) -> Frame {
        if !args.is_empty() {
            return wrong_arity("teardown");
        }
        self.feed.pool().teardown_all().await;
        Frame::ok()
    }

    fn handle_failed(&self, args: &[String]) -> Frame {
        match one_position(args, "failed") {
            Ok(position) => Frame::Integer(self.feed.pool().is_failed(position) as i64),
            Err(reply) => reply,
        }
    }

    fn handle_state(&self, args: &[String]) -> Frame {
        match one_position(args, "state") {
            Ok(position) => Frame::Simple(self.feed.pool().state(position).as_str().to_string()),
            Err(reply) => reply,
        }
    }

    /// `PAGE collection page size [REFRESH]`
    async fn handle_page(&self, args: &[String]) -> Frame {
        let (collection, page, size, refresh) = match args {
            [collection, page, size] => (collection, page, size, false),
            [collection, page, size, flag] if flag.eq_ignore_ascii_case("refresh") => {
                (collection, page, size, true)
            }
            _ => return wrong_arity("page"),
        };
        let (Ok(page), Ok(size)) = (page.parse::<u32>(), size.parse::<u32>()) else {
            return Frame::err("page and size must be non-negative integers");
        };

        let key = PageKey::new(collection.clone(), page, size);
        let page = self.feed.store().get_page(&key, refresh).await;
        Frame::text(page_json(&page).to_string())
    }

    /// `RECORD id [REFRESH]`
    async fn handle_record(&self, args: &[String]) -> Frame {
        let (id, refresh) = match args {
            [id] => (id, false),
            [id, flag] if flag.eq_ignore_ascii_case("refresh") => (id, true),
            _ => return wrong_arity("record"),
        };

        match self.feed.store().get_record(id, refresh).await {
            Some(record) => record_frame(&record),
            None => Frame::null(),
        }
    }

    async fn handle_like(&self, args: &[String], liked: bool) -> Frame {
        let [id] = args else {
            return wrong_arity(if liked { "like" } else { "unlike" });
        };

        let result = if liked {
            self.feed.like(id).await
        } else {
            self.feed.unlike(id).await
        };
        match result {
            Ok(Some(record)) => record_frame(&record),
            Ok(None) => Frame::ok(),
            Err(e) => Frame::err(e),
        }
    }

    fn handle_is_liked(&self, args: &[String]) -> Frame {
        match args {
            [id] => Frame::Integer(self.feed.store().is_liked(id) as i64),
            _ => wrong_arity("isliked"),
        }
    }

    fn handle_flush(&self, args: &[String]) -> Frame {
        if !args.is_empty() {
            return wrong_arity("flush");
        }
        match self.feed.store().flush() {
            Ok(()) => Frame::ok(),
            Err(e) => {
                warn!(error = %e, "flush failed");
                Frame::err(e)
            }
        }
    }

    fn handle_invalidate(&self, args: &[String]) -> Frame {
        if !args.is_empty() {
            return wrong_arity("invalidate");
        }
        match self.feed.store().invalidate_all() {
            Ok(()) => Frame::ok(),
            Err(e) => Frame::err(e),
        }
    }

    fn handle_outage(&self, args: &[String]) -> Frame {
        let outage = match args {
            [flag] if flag.eq_ignore_ascii_case("on") => true,
            [flag] if flag.eq_ignore_ascii_case("off") => false,
            [] => return Frame::Integer(self.catalog.in_outage() as i64),
            _ => return Frame::err("usage: OUTAGE [on|off]"),
        };
        self.catalog.set_outage(outage);
        Frame::ok()
    }

    fn handle_info(&self) -> Frame {
        let cache = self.feed.store().cache_stats();
        let pool = self.feed.pool().stats();
        let player = self.feed.pool().factory();
        let optional = |v: Option<i64>| v.map(|p| p.to_string()).unwrap_or_default();

        let info = format!(
            "# Server\r\n\
             reeld_version:{}\r\n\
             \r\n\
             # Records\r\n\
             records_size:{}\r\n\
             records_capacity:{}\r\n\
             records_utilization:{:.2}\r\n\
             pages_size:{}\r\n\
             pages_capacity:{}\r\n\
             pages_utilization:{:.2}\r\n\
             liked_size:{}\r\n\
             liked_capacity:{}\r\n\
             cache_hits:{}\r\n\
             cache_misses:{}\r\n\
             cache_hit_ratio:{:.2}\r\n\
             stale_serves:{}\r\n\
             evictions:{}\r\n\
             fetch_failures:{}\r\n\
             flag_writes:{}\r\n\
             pending_writes:{}\r\n\
             \r\n\
             # Pool\r\n\
             focus:{}\r\n\
             playing:{}\r\n\
             live:{}\r\n\
             initializing:{}\r\n\
             ready:{}\r\n\
             failed:{}\r\n\
             max_concurrent:{}\r\n\
             created:{}\r\n\
             failures:{}\r\n\
             timeouts:{}\r\n\
             destroyed:{}\r\n\
             discarded:{}\r\n\
             generation:{}\r\n\
             open_decoders:{}\r\n\
             opened_decoders:{}\r\n\
             \r\n\
             # Catalog\r\n\
             catalog_records:{}\r\n\
             outage:{}\r\n",
            env!("CARGO_PKG_VERSION"),
            cache.records.size,
            cache.records.capacity,
            cache.records.utilization(),
            cache.pages.size,
            cache.pages.capacity,
            cache.pages.utilization(),
            cache.liked.size,
            cache.liked.capacity,
            cache.hits,
            cache.misses,
            cache.hit_ratio,
            cache.stale_serves,
            cache.evictions,
            cache.fetch_failures,
            cache.flag_writes,
            self.feed.store().has_pending_writes() as u8,
            optional(self.feed.pool().focus()),
            optional(self.feed.pool().playing_position()),
            pool.live,
            pool.initializing,
            pool.ready,
            pool.failed,
            pool.max_concurrent,
            pool.created,
            pool.failures,
            pool.timeouts,
            pool.destroyed,
            pool.discarded,
            pool.generation,
            player.open_sessions(),
            player.opened_total(),
            self.catalog.len(),
            self.catalog.in_outage() as u8,
        );
        Frame::text(info)
    }
}

fn wrong_arity(command: &str) -> Frame {
    Frame::err(format!("wrong number of arguments for '{}' command", command))
}

fn one_position(args: &[String], command: &str) -> Result<i64, Frame> {
    match args {
        [position] => position
            .parse()
            .map_err(|_| Frame::err("position is not an integer")),
        _ => Err(wrong_arity(command)),
    }
}

fn source_name(source: PageSource) -> &'static str {
    match source {
        PageSource::Cache => "cache",
        PageSource::Network => "network",
        PageSource::Stale => "stale",
        PageSource::Synthesized => "synthesized",
        PageSource::Empty => "empty",
    }
}

fn page_json(page: &Page) -> serde_json::Value {
    json!({
        "source": source_name(page.source),
        "records": page.records,
    })
}

fn record_frame(record: &Record) -> Frame {
    match serde_json::to_string(record) {
        Ok(body) => Frame::text(body),
        Err(e) => Frame::err(e),
    }
}
