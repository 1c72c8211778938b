//! Integration tests for the celx client
//!
//! These drive a whole browsing session against an in-memory server.

use celx::markup::{compile_page, ComponentRegistry, MarkupParser};
use celx::network::{Method, Request, Response, Transport};
use celx::renderer::{Selector, WidgetTree};
use celx::{Browser, BrowserConfig, CelxError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

/// Serves fixed bodies by path and records every request
#[derive(Default)]
struct Server {
    routes: Mutex<HashMap<String, (u16, &'static str, String)>>,
    requests: Mutex<Vec<(Method, String, Option<String>)>>,
}

impl Server {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn page(self: &Arc<Self>, path: &str, body: &str) -> Arc<Self> {
        self.serve(path, 200, "text/celx", body)
    }

    fn serve(self: &Arc<Self>, path: &str, status: u16, content_type: &'static str, body: &str) -> Arc<Self> {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, content_type, body.to_string()));
        self.clone()
    }

    fn requests(&self) -> Vec<(Method, String, Option<String>)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for Server {
    fn send(&self, request: Request) -> celx::Result<Response> {
        let path = request.url().path().to_string();
        let body = request
            .body_bytes()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
        self.requests
            .lock()
            .unwrap()
            .push((request.method(), path.clone(), body));

        let url = request.url().as_str();
        Ok(match self.routes.lock().unwrap().get(&path) {
            Some((status, content_type, body)) => {
                Response::new(*status, url, body.clone()).with_header("content-type", *content_type)
            }
            None => Response::new(404, url, ""),
        })
    }
}

fn browse(server: &Arc<Server>, destination: &str) -> Browser {
    let config = BrowserConfig::new("http://app.local/");
    let mut browser = Browser::new(config, server.clone()).unwrap();
    browser.route(destination, false).unwrap();
    browser.run_until_idle();
    browser
}

fn rendered(browser: &Browser, selector: &str) -> Vec<String> {
    browser
        .tree()
        .find_all(&Selector::parse(selector).unwrap(), &[browser.tree().root().unwrap()])
        .into_iter()
        .map(|id| browser.tree().render_content(id).unwrap().unwrap_or_default())
        .collect()
}

const TODO_PAGE: &str = r#"
<celx>
  <page title="Todo">
    <script>total = 3</script>
    <tower eid="root">
      <row eid="form">
        <field name="item">milk</field>
        <button eid="add" on-submit=":POST /items; APPEND in #list">Add</button>
        <button eid="broken" on-submit=":GET /broken; SWAP #list">Break</button>
        <button eid="plain" on-submit=":GET /plain; SWAP in #list">Plain</button>
      </row>
      <tower eid="list"/>
    </tower>
  </page>
</celx>
"#;

#[test]
fn test_components_and_slots() {
    let server = Server::new().page(
        "/",
        r#"<celx><page>
            <component name="card" heading="untitled">
              <tower groups="card"><text>$heading</text><_slot/><text>footer</text></tower>
            </component>
            <card heading="Hello"><text>inside</text></card>
        </page></celx>"#,
    );
    let browser = browse(&server, "/");

    assert_eq!(rendered(&browser, "Text"), vec!["Hello", "inside", "footer"]);
    assert_eq!(browser.find(".card").unwrap(), browser.tree().root());
}

#[test]
fn test_remote_call_appends_fragment() {
    let server = Server::new()
        .page("/", TODO_PAGE)
        .page("/items", r#"<text eid="entry">Item $total</text>"#);
    let mut browser = browse(&server, "/");
    assert_eq!(browser.title(), "celx");

    let add = browser.find("Button#add").unwrap().unwrap();
    assert!(browser.dispatch(add, "on_submit").unwrap());
    browser.run_until_idle();

    assert!(browser.errors().is_empty(), "{:?}", browser.errors());
    assert_eq!(rendered(&browser, "Tower#list Text"), vec!["Item 3"]);

    let (method, path, body) = server.requests().pop().unwrap();
    assert_eq!(method, Method::Post);
    assert_eq!(path, "/items");
    let body: serde_json::Value = serde_json::from_str(&body.unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({ "item": "milk" }));
}

#[test]
fn test_plain_response_becomes_text() {
    let server = Server::new()
        .page("/", TODO_PAGE)
        .serve("/plain", 200, "text/plain", "just words");
    let mut browser = browse(&server, "/");

    let plain = browser.find("Button#plain").unwrap().unwrap();
    browser.dispatch(plain, "on_submit").unwrap();
    browser.run_until_idle();

    assert_eq!(rendered(&browser, "Tower#list Text"), vec!["just words"]);
}

#[test]
fn test_failed_call_halts_session() {
    let server = Server::new()
        .page("/", TODO_PAGE)
        .serve("/broken", 500, "text/plain", "boom");
    let mut browser = browse(&server, "/");

    let broken = browser.find("Button#broken").unwrap().unwrap();
    browser.dispatch(broken, "on_submit").unwrap();
    browser.run_until_idle();

    assert!(browser.is_halted());
    assert!(matches!(
        browser.errors(),
        [CelxError::Network(celx::utils::error::NetworkError::Http { status: 500, .. })]
    ));
    // the list was never touched
    assert!(browser.find("Tower#list").unwrap().is_some());

    let add = browser.find("Button#add").unwrap().unwrap();
    assert!(!browser.dispatch(add, "on_submit").unwrap());
}

#[test]
fn test_navigation_history() {
    let server = Server::new()
        .page("/", r#"<celx><page title="Home"><text>home</text></page></celx>"#)
        .page("/about", r#"<celx><page title="About"><text>about</text></page></celx>"#);
    let mut browser = browse(&server, "/");
    assert_eq!(browser.title(), "celx");

    browser.route("/about", false).unwrap();
    assert_eq!(browser.title(), "About");
    assert_eq!(browser.current_url().as_str(), "http://app.local/about");

    browser.back().unwrap();
    assert_eq!(rendered(&browser, "Text"), vec!["home"]);
    browser.forward().unwrap();
    assert_eq!(rendered(&browser, "Text"), vec!["about"]);
    assert_eq!(browser.history().len(), 2);
}

#[test]
fn test_missing_page_is_fatal() {
    let server = Server::new();
    let config = BrowserConfig::new("http://app.local/");
    let mut browser = Browser::new(config, server.clone()).unwrap();

    let err = browser.route("/nowhere", false).unwrap_err();
    assert_eq!(err.to_string(), "network error: HTTP 404 for http://app.local/nowhere");
    assert!(browser.page().is_none());
}

#[test]
fn test_sources_are_inlined() {
    let server = Server::new()
        .page(
            "/",
            r#"<celx><page><style src="/theme.style"/><text eid="t">styled</text></page></celx>"#,
        )
        .serve("/theme.style", 200, "text/plain", "Text:\n  color: green");
    let browser = browse(&server, "/");

    let text = browser.find("Text#t").unwrap().unwrap();
    assert_eq!(
        browser.style_of(text).get("color"),
        Some(&celx::markup::StyleValue::Str("green".into()))
    );
    assert_eq!(server.requests().len(), 2);
}

#[test]
fn test_listeners_follow_writes() {
    let server = Server::new().page(
        "/",
        r#"<celx><page><tower>
            <script>
                clicks = 0
                on_change("clicks", function(new, old) last = old .. "->" .. new end)
            </script>
            <button eid="b" on-submit="clicks = clicks + 1">+</button>
            <text eid="t">$clicks</text>
        </tower></page></celx>"#,
    );
    let mut browser = browse(&server, "/");
    let button = browser.find("Button#b").unwrap().unwrap();

    browser.dispatch(button, "on_submit").unwrap();
    browser.dispatch(button, "on_submit").unwrap();

    assert_eq!(rendered(&browser, "Text#t"), vec!["2"]);
    let scope = browser.tree().widget(browser.tree().root().unwrap()).unwrap().scope().unwrap().clone();
    assert_eq!(scope.get("last").map(|v| celx::script::display(&v)), Some("1->2".to_string()));
}

#[test]
fn test_failed_page_keeps_previous() {
    let server = Server::new()
        .page("/", r#"<celx><page><text eid="h">home<style>color: blue</style></text></page></celx>"#)
        .page(
            "/bad",
            r#"<celx><page title="Bad"><script>error("broken")</script><text>bad</text></page></celx>"#,
        )
        .page(
            "/bad-init",
            r#"<celx><page title="Bad"><text><script>function init() error("no") end</script>bad</text></page></celx>"#,
        );
    let mut browser = browse(&server, "/");
    let before = browser.tree().len();
    let heading = browser.find("Text#h").unwrap().unwrap();

    for destination in ["/bad", "/bad-init"] {
        let err = browser.route(destination, false).unwrap_err();
        assert!(matches!(err, CelxError::Script(_)), "{:?}", err);

        assert_eq!(browser.title(), "celx");
        assert_eq!(browser.current_url().as_str(), "http://app.local/");
        assert_eq!(browser.tree().root(), Some(heading));
        assert_eq!(browser.tree().len(), before);
        assert_eq!(rendered(&browser, "Text"), vec!["home"]);
        assert_eq!(
            browser.style_of(heading).get("color"),
            Some(&celx::markup::StyleValue::Str("blue".into()))
        );
    }
}

const PICK_PAGE: &str = r#"
<celx><page><tower eid="root">
  <button eid="pick" on-submit=":GET /frag; SELECT Text#item; SWAP in #main">Pick</button>
  <tower eid="main"><text>placeholder</text></tower>
</tower></page></celx>
"#;

#[test]
fn test_select_picks_part_of_fragment() {
    let server = Server::new().page("/", PICK_PAGE).page(
        "/frag",
        r#"<tower><text eid="item">picked $n<script>n = 1</script></text><text eid="other">dropped</text></tower>"#,
    );
    let mut browser = browse(&server, "/");
    let before = browser.tree().len();

    let pick = browser.find("Button#pick").unwrap().unwrap();
    browser.dispatch(pick, "on_submit").unwrap();
    browser.run_until_idle();

    assert!(browser.errors().is_empty(), "{:?}", browser.errors());
    assert_eq!(rendered(&browser, "Tower#main Text"), vec!["picked 1"]);
    assert!(browser.find("Text#other").unwrap().is_none());
    assert_eq!(browser.pending_fragments(), 0);
    // placeholder swapped out for the picked text
    assert_eq!(browser.tree().len(), before);
}

#[test]
fn test_select_without_match_fails() {
    let server = Server::new()
        .page("/", PICK_PAGE)
        .page("/frag", r#"<tower><text eid="other">dropped</text></tower>"#);
    let mut browser = browse(&server, "/");

    let pick = browser.find("Button#pick").unwrap().unwrap();
    browser.dispatch(pick, "on_submit").unwrap();
    browser.run_until_idle();

    assert_eq!(browser.errors().len(), 1);
    assert_eq!(
        browser.errors()[0].to_string(),
        "selection error: nothing matched selector 'Text#item'"
    );
    assert_eq!(rendered(&browser, "Tower#main Text"), vec!["placeholder"]);
}

#[test]
fn test_unplaced_fragment_is_released() {
    let server = Server::new()
        .page("/", &TODO_PAGE.replace(":POST /items; APPEND in #list", ":GET /items; SWAP #nowhere"))
        .page("/items", r#"<text>orphan</text>"#);
    let config = BrowserConfig::new("http://app.local/").with_fail_fast(false);
    let mut browser = Browser::new(config, server.clone()).unwrap();
    browser.route("/", false).unwrap();
    let before = browser.tree().len();

    let add = browser.find("Button#add").unwrap().unwrap();
    browser.dispatch(add, "on_submit").unwrap();
    browser.run_until_idle();

    assert_eq!(browser.errors().len(), 1);
    assert!(!browser.is_halted());
    assert_eq!(browser.pending_fragments(), 0);
    assert_eq!(browser.tree().len(), before);
}

#[test]
fn test_replaying_a_list_is_deterministic() {
    let server = Server::new()
        .page("/", TODO_PAGE)
        .page("/items", r#"<row><text>Item $total</text><checkbox name="done"/></row>"#);

    let session = || {
        let mut browser = browse(&server, "/");
        let add = browser.find("Button#add").unwrap().unwrap();
        for _ in 0..2 {
            browser.dispatch(add, "on_submit").unwrap();
            browser.run_until_idle();
        }
        assert!(browser.errors().is_empty(), "{:?}", browser.errors());
        browser.outline().unwrap()
    };

    let first = session();
    assert_eq!(first, session());
    assert_eq!(first.matches("Item 3").count(), 2);
}

/// Holds requests for one path until the test opens the gate
struct Gated {
    server: Arc<Server>,
    path: &'static str,
    state: Mutex<(bool, bool)>,
    changed: Condvar,
}

impl Gated {
    fn new(server: Arc<Server>, path: &'static str) -> Arc<Self> {
        Arc::new(Self {
            server,
            path,
            state: Mutex::new((false, false)),
            changed: Condvar::new(),
        })
    }

    /// Whether a request for the gated path is being held
    fn holding(&self) -> bool {
        self.state.lock().unwrap().0
    }

    fn open(&self) {
        self.state.lock().unwrap().1 = true;
        self.changed.notify_all();
    }
}

impl Transport for Gated {
    fn send(&self, request: Request) -> celx::Result<Response> {
        if request.url().path() == self.path {
            let mut state = self.state.lock().unwrap();
            state.0 = true;
            self.changed.notify_all();
            let _state = self.changed.wait_while(state, |(_, open)| !*open).unwrap();
        }
        self.server.send(request)
    }
}

#[test]
fn test_navigation_cancels_running_list() {
    let server = Server::new()
        .page("/", TODO_PAGE)
        .page("/items", r#"<text>late</text>"#)
        .page("/other", r#"<celx><page title="Other"><tower eid="list"><text>other</text></tower></page></celx>"#);
    let gated = Gated::new(server.clone(), "/items");
    let mut browser = Browser::new(BrowserConfig::new("http://app.local/"), gated.clone()).unwrap();
    browser.route("/", false).unwrap();

    let add = browser.find("Button#add").unwrap().unwrap();
    browser.dispatch(add, "on_submit").unwrap();
    // the worker needs the owner to serialize its request body
    while !gated.holding() {
        browser.pump();
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    assert_eq!(browser.running(), 1);

    browser.route("/other", false).unwrap();
    let shown = browser.tree().len();
    gated.open();
    browser.run_until_idle();

    assert!(browser.errors().is_empty(), "{:?}", browser.errors());
    assert!(!browser.is_halted());
    assert_eq!(browser.running(), 0);
    assert_eq!(rendered(&browser, "Text"), vec!["other"]);
    assert_eq!(browser.tree().len(), shown);
    assert_eq!(browser.pending_fragments(), 0);
}

#[test]
fn test_confirm_dialogue() {
    let server = Server::new().page(
        "/",
        r#"<celx><page><tower>
            <script>answer = "none"</script>
            <button eid="ask" on-submit="confirm('Sure?', 'Really delete', function(ok) answer = ok end)">Ask</button>
            <text eid="t">$answer</text>
        </tower></page></celx>"#,
    );
    let mut browser = browse(&server, "/");
    let ask = browser.find("Button#ask").unwrap().unwrap();

    browser.dispatch(ask, "on_submit").unwrap();
    assert_eq!(browser.dialogues().len(), 1);
    let dialogue = browser.dialogues()[0];
    let texts: Vec<String> = browser
        .tree()
        .find_all(&Selector::parse("Text").unwrap(), &[dialogue])
        .into_iter()
        .filter_map(|id| browser.tree().widget(id).unwrap().content().map(str::to_string))
        .collect();
    assert_eq!(texts, vec!["Sure?", "Really delete"]);

    let confirm = browser.find("Dialogue Button").unwrap().unwrap();
    assert!(!browser.dispatch(confirm, "on_submit").unwrap());

    assert!(browser.errors().is_empty(), "{:?}", browser.errors());
    assert!(browser.dialogues().is_empty());
    assert!(!browser.tree().contains(dialogue));
    assert_eq!(rendered(&browser, "Text#t"), vec!["true"]);
}

#[test]
fn test_dialogues_close_on_navigation() {
    let server = Server::new()
        .page("/", r#"<celx><page><script>alert("hello")</script><text>home</text></page></celx>"#)
        .page("/next", r#"<celx><page><text>next</text></page></celx>"#);
    let mut browser = browse(&server, "/");
    assert_eq!(browser.alerts(), &["hello".to_string()]);
    assert_eq!(browser.dialogues().len(), 1);
    let dialogue = browser.dialogues()[0];

    browser.route("/next", false).unwrap();
    assert!(browser.dialogues().is_empty());
    assert!(!browser.tree().contains(dialogue));
}

#[test]
fn test_scripts_build_widgets() {
    let server = Server::new().page(
        "/",
        r#"<celx><page><tower eid="root">
            <button eid="make" on-submit="find('Tower#root'):append(w.Text{'made', eid = 'made', groups = 'fresh'})">Make</button>
        </tower></page></celx>"#,
    );
    let mut browser = browse(&server, "/");
    let make = browser.find("Button#make").unwrap().unwrap();

    browser.dispatch(make, "on_submit").unwrap();
    assert!(browser.errors().is_empty(), "{:?}", browser.errors());
    let made = browser.find("Text#made").unwrap().unwrap();
    assert_eq!(browser.tree().parent(made), browser.tree().root());
    assert_eq!(browser.find(".fresh").unwrap(), Some(made));
    assert_eq!(rendered(&browser, "Text"), vec!["made"]);
}

#[test]
fn test_integer_edge_cases_in_scripts() {
    let server = Server::new().page(
        "/",
        r#"<celx><page><tower>
            <script>
                a = math.mininteger
                b = a // -1
                c = a % -1
            </script>
            <text eid="t">$b $c</text>
        </tower></page></celx>"#,
    );
    let browser = browse(&server, "/");
    assert_eq!(rendered(&browser, "Text#t"), vec!["-9223372036854775808 0"]);
}

proptest! {
    #[test]
    fn test_dsl_preserves_instruction_order(endpoints in prop::collection::vec("/[a-z]{1,8}", 1..6)) {
        let descriptor = endpoints
            .iter()
            .map(|endpoint| format!("GET {}; APPEND in #list", endpoint))
            .collect::<Vec<_>>()
            .join("\n");
        let instructions = celx::dsl::compile(&descriptor).unwrap();

        prop_assert_eq!(instructions.len(), endpoints.len() * 2);
        for (pair, endpoint) in instructions.chunks(2).zip(&endpoints) {
            prop_assert_eq!(&pair[0].arg, endpoint);
            prop_assert_eq!(pair[1].modifier.as_deref(), Some("in"));
        }
    }

    #[test]
    fn test_component_params_substituted(value in "[A-Za-z0-9][A-Za-z0-9 ]{0,11}") {
        let source = format!(
            r#"<page><component name="greet" who="nobody"><text>Hi $who</text></component><greet who="{}"/></page>"#,
            value
        );
        let document = MarkupParser::parse(&source).unwrap();
        let mut registry = ComponentRegistry::new();
        let mut tree = WidgetTree::new();

        let page = compile_page(&document, &mut registry, &mut tree).unwrap();
        let root = page.content.unwrap().root;
        let expected = format!("Hi {}", value);
        prop_assert_eq!(tree.widget(root).unwrap().content(), Some(expected.as_str()));
    }
}
