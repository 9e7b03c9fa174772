//! A small simulated page for embedders and tests.
//!
//! Builds a realm shaped like a browser page: a `Window` global with storage,
//! network entry points and a request constructor, an `HTMLDocument` with
//! query methods, `Location`, `Navigator`, `History`, `Screen`, and one
//! `HTMLCanvasElement`. Navigator state lives on `NavigatorPrototype` the way
//! it does in a browser, so interception of it is skipped.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::inventory::OwnerBindings;
use crate::object_model::{HostError, HostValue, ObjectHandle, Realm};

pub const PAGE_ORIGIN: &str = "https://example.test";

/// Handles of the page's well-known objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandles {
    pub window: ObjectHandle,
    pub document: ObjectHandle,
    pub location: ObjectHandle,
    pub navigator: ObjectHandle,
    pub history: ObjectHandle,
    pub screen: ObjectHandle,
    pub canvas: ObjectHandle,
    pub request_prototype: ObjectHandle,
}

impl PageHandles {
    /// Names used by [`crate::inventory::HookInventory::page_default`].
    pub fn bindings(&self) -> OwnerBindings {
        OwnerBindings::new()
            .bind("window", self.window)
            .bind("document", self.document)
            .bind("location", self.location)
            .bind("navigator", self.navigator)
            .bind("history", self.history)
            .bind("screen", self.screen)
            .bind("canvas", self.canvas)
    }
}

/// Populate `realm` with a page and return its handles.
pub fn build_page(realm: &mut Realm) -> Result<PageHandles, HostError> {
    let window = realm.alloc(None, Some("Window"));
    let location = build_location(realm)?;
    let document = build_document(realm, location)?;
    let navigator = build_navigator(realm)?;
    let history = build_history(realm)?;
    let screen = build_screen(realm)?;
    let canvas = build_canvas(realm)?;
    let request_prototype = build_request_prototype(realm)?;

    realm.set_own_data(window, "window", HostValue::Object(window))?;
    realm.set_own_data(window, "document", HostValue::Object(document))?;
    realm.set_own_data(window, "location", HostValue::Object(location))?;
    realm.set_own_data(window, "navigator", HostValue::Object(navigator))?;
    realm.set_own_data(window, "history", HostValue::Object(history))?;
    realm.set_own_data(window, "screen", HostValue::Object(screen))?;

    let local = build_storage(realm)?;
    let session = build_storage(realm)?;
    realm.set_own_data(window, "localStorage", HostValue::Object(local))?;
    realm.set_own_data(window, "sessionStorage", HostValue::Object(session))?;
    let idb = realm.alloc(None, Some("IDBFactory"));
    realm.define_method(idb, "open", 2, |realm, inv| {
        let request = realm.alloc(None, Some("IDBOpenDBRequest"));
        realm.set_own_data(request, "name", inv.arg(0))?;
        Ok(HostValue::Object(request))
    })?;
    realm.set_own_data(window, "indexedDB", HostValue::Object(idb))?;

    realm.define_method(window, "fetch", 2, |realm, inv| {
        let response = realm.alloc(None, Some("Response"));
        realm.set_own_data(response, "url", inv.arg(0))?;
        realm.set_own_data(response, "status", HostValue::Int(200))?;
        realm.set_own_data(response, "ok", HostValue::Bool(true))?;
        Ok(HostValue::Object(response))
    })?;
    realm.define_method(window, "postMessage", 2, |_, _| Ok(HostValue::Undefined))?;
    realm.define_method(window, "WebSocket", 2, |realm, inv| {
        let socket = realm.alloc(None, Some("WebSocket"));
        realm.set_own_data(socket, "url", inv.arg(0))?;
        realm.set_own_data(socket, "readyState", HostValue::Int(0))?;
        realm.define_method(socket, "send", 1, |_, _| Ok(HostValue::Undefined))?;
        Ok(HostValue::Object(socket))
    })?;
    realm.define_method(window, "XMLHttpRequest", 0, move |realm, _| {
        let request = realm.alloc(Some(request_prototype), Some("XMLHttpRequest"));
        realm.set_own_data(request, "readyState", HostValue::Int(0))?;
        Ok(HostValue::Object(request))
    })?;

    Ok(PageHandles {
        window,
        document,
        location,
        navigator,
        history,
        screen,
        canvas,
        request_prototype,
    })
}

fn set_all(realm: &mut Realm, owner: ObjectHandle, members: &[(&str, HostValue)]) -> Result<(), HostError> {
    for (member, value) in members {
        realm.set_own_data(owner, member, value.clone())?;
    }
    Ok(())
}

fn element(realm: &mut Realm, tag: &str) -> Result<ObjectHandle, HostError> {
    let element = realm.alloc(None, Some("HTMLElement"));
    realm.set_own_data(element, "tagName", HostValue::from(tag.to_ascii_uppercase()))?;
    Ok(element)
}

fn collection(realm: &mut Realm, class_tag: &str, items: &[ObjectHandle]) -> Result<ObjectHandle, HostError> {
    let list = realm.alloc(None, Some(class_tag));
    for (index, item) in items.iter().enumerate() {
        realm.set_own_data(list, &index.to_string(), HostValue::Object(*item))?;
    }
    realm.set_own_data(list, "length", HostValue::Int(items.len() as i64))?;
    Ok(list)
}

fn build_location(realm: &mut Realm) -> Result<ObjectHandle, HostError> {
    let location = realm.alloc(None, Some("Location"));
    let host = PAGE_ORIGIN.trim_start_matches("https://");
    set_all(
        realm,
        location,
        &[
            ("href", HostValue::from(format!("{PAGE_ORIGIN}/app?q=1#top"))),
            ("protocol", HostValue::from("https:")),
            ("host", HostValue::from(host)),
            ("hostname", HostValue::from(host)),
            ("port", HostValue::from("")),
            ("pathname", HostValue::from("/app")),
            ("search", HostValue::from("?q=1")),
            ("hash", HostValue::from("#top")),
            ("origin", HostValue::from(PAGE_ORIGIN)),
        ],
    )?;
    Ok(location)
}

fn build_document(realm: &mut Realm, location: ObjectHandle) -> Result<ObjectHandle, HostError> {
    let document = realm.alloc(None, Some("HTMLDocument"));
    let html = element(realm, "html")?;
    let head = element(realm, "head")?;
    let body = element(realm, "body")?;
    let app = element(realm, "div")?;
    realm.set_own_data(app, "id", HostValue::from("app"))?;
    let images = collection(realm, "HTMLCollection", &[])?;
    let links = collection(realm, "HTMLCollection", &[])?;
    let forms = collection(realm, "HTMLCollection", &[])?;
    let scripts = collection(realm, "HTMLCollection", &[])?;

    set_all(
        realm,
        document,
        &[
            ("cookie", HostValue::from("")),
            ("domain", HostValue::from(PAGE_ORIGIN.trim_start_matches("https://"))),
            ("location", HostValue::Object(location)),
            ("referrer", HostValue::from("")),
            ("title", HostValue::from("Example")),
            ("URL", HostValue::from(format!("{PAGE_ORIGIN}/app?q=1#top"))),
            ("documentElement", HostValue::Object(html)),
            ("head", HostValue::Object(head)),
            ("body", HostValue::Object(body)),
            ("images", HostValue::Object(images)),
            ("links", HostValue::Object(links)),
            ("forms", HostValue::Object(forms)),
            ("scripts", HostValue::Object(scripts)),
        ],
    )?;

    realm.define_method(document, "getElementById", 1, move |_, inv| {
        Ok(match inv.arg(0).as_str() {
            Some("app") => HostValue::Object(app),
            _ => HostValue::Null,
        })
    })?;
    realm.define_method(document, "querySelector", 1, move |_, inv| {
        Ok(match inv.arg(0).as_str() {
            Some("#app") => HostValue::Object(app),
            Some("body") => HostValue::Object(body),
            _ => HostValue::Null,
        })
    })?;
    for name in [
        "getElementsByClassName",
        "getElementsByName",
        "getElementsByTagName",
    ] {
        realm.define_method(document, name, 1, |realm, _| {
            Ok(HostValue::Object(collection(realm, "HTMLCollection", &[])?))
        })?;
    }
    realm.define_method(document, "querySelectorAll", 1, |realm, _| {
        Ok(HostValue::Object(collection(realm, "NodeList", &[])?))
    })?;
    realm.define_method(document, "createElement", 1, |realm, inv| {
        let tag = inv.arg(0).to_string();
        Ok(HostValue::Object(element(realm, &tag)?))
    })?;
    realm.define_method(document, "createElementNS", 2, |realm, inv| {
        let tag = inv.arg(1).to_string();
        let created = element(realm, &tag)?;
        realm.set_own_data(created, "namespaceURI", inv.arg(0))?;
        Ok(HostValue::Object(created))
    })?;
    realm.define_method(document, "createTextNode", 1, |realm, inv| {
        let node = realm.alloc(None, Some("Text"));
        realm.set_own_data(node, "data", HostValue::from(inv.arg(0).to_string()))?;
        Ok(HostValue::Object(node))
    })?;
    Ok(document)
}

fn build_navigator(realm: &mut Realm) -> Result<ObjectHandle, HostError> {
    let prototype = realm.alloc(None, Some("NavigatorPrototype"));
    let languages = realm.alloc(None, Some("Array"));
    set_all(
        realm,
        languages,
        &[
            ("0", HostValue::from("en-US")),
            ("1", HostValue::from("en")),
            ("length", HostValue::Int(2)),
        ],
    )?;
    set_all(
        realm,
        prototype,
        &[
            ("userAgent", HostValue::from("Mozilla/5.0 (X11; Linux x86_64)")),
            ("language", HostValue::from("en-US")),
            ("languages", HostValue::Object(languages)),
            ("platform", HostValue::from("Linux x86_64")),
            ("vendor", HostValue::from("")),
            ("appName", HostValue::from("Netscape")),
            ("appVersion", HostValue::from("5.0 (X11)")),
            ("product", HostValue::from("Gecko")),
            ("productSub", HostValue::from("20030107")),
            ("onLine", HostValue::Bool(true)),
            ("hardwareConcurrency", HostValue::Int(8)),
            ("maxTouchPoints", HostValue::Int(0)),
        ],
    )?;
    Ok(realm.alloc(Some(prototype), Some("Navigator")))
}

fn build_history(realm: &mut Realm) -> Result<ObjectHandle, HostError> {
    let history = realm.alloc(None, Some("History"));
    realm.set_own_data(history, "length", HostValue::Int(1))?;
    realm.set_own_data(history, "state", HostValue::Null)?;
    realm.define_method(history, "pushState", 3, |realm, inv| {
        let this = inv.receiver_object("pushState")?;
        let length = match realm.get(this, "length")? {
            HostValue::Int(n) => n,
            _ => 0,
        };
        realm.set(this, "length", HostValue::Int(length + 1))?;
        realm.set(this, "state", inv.arg(0))?;
        Ok(HostValue::Undefined)
    })?;
    realm.define_method(history, "replaceState", 3, |realm, inv| {
        let this = inv.receiver_object("replaceState")?;
        realm.set(this, "state", inv.arg(0))?;
        Ok(HostValue::Undefined)
    })?;
    realm.define_method(history, "go", 1, |_, _| Ok(HostValue::Undefined))?;
    realm.define_method(history, "back", 0, |_, _| Ok(HostValue::Undefined))?;
    realm.define_method(history, "forward", 0, |_, _| Ok(HostValue::Undefined))?;
    Ok(history)
}

fn build_screen(realm: &mut Realm) -> Result<ObjectHandle, HostError> {
    let screen = realm.alloc(None, Some("Screen"));
    set_all(
        realm,
        screen,
        &[
            ("width", HostValue::Int(1920)),
            ("height", HostValue::Int(1080)),
            ("availWidth", HostValue::Int(1920)),
            ("availHeight", HostValue::Int(1040)),
            ("colorDepth", HostValue::Int(24)),
            ("pixelDepth", HostValue::Int(24)),
        ],
    )?;
    Ok(screen)
}

fn build_storage(realm: &mut Realm) -> Result<ObjectHandle, HostError> {
    let storage = realm.alloc(None, Some("Storage"));
    let items: Rc<RefCell<BTreeMap<String, String>>> = Rc::default();

    let reader = Rc::clone(&items);
    realm.define_method(storage, "getItem", 1, move |_, inv| {
        Ok(reader
            .borrow()
            .get(&inv.arg(0).to_string())
            .map(|v| HostValue::from(v.as_str()))
            .unwrap_or(HostValue::Null))
    })?;
    let writer = Rc::clone(&items);
    realm.define_method(storage, "setItem", 2, move |_, inv| {
        writer
            .borrow_mut()
            .insert(inv.arg(0).to_string(), inv.arg(1).to_string());
        Ok(HostValue::Undefined)
    })?;
    realm.define_method(storage, "removeItem", 1, move |_, inv| {
        items.borrow_mut().remove(&inv.arg(0).to_string());
        Ok(HostValue::Undefined)
    })?;
    Ok(storage)
}

/// Request methods live on the shared prototype, as in a browser.
fn build_request_prototype(realm: &mut Realm) -> Result<ObjectHandle, HostError> {
    let prototype = realm.alloc(None, Some("XMLHttpRequestPrototype"));
    realm.define_method(prototype, "open", 2, |realm, inv| {
        let this = inv.receiver_object("open")?;
        realm.set(this, "method", inv.arg(0))?;
        realm.set(this, "url", inv.arg(1))?;
        realm.set(this, "readyState", HostValue::Int(1))?;
        Ok(HostValue::Undefined)
    })?;
    realm.define_method(prototype, "setRequestHeader", 2, |realm, inv| {
        let this = inv.receiver_object("setRequestHeader")?;
        if realm.get(this, "readyState")? != HostValue::Int(1) {
            return Err(HostError::Thrown(HostValue::from("InvalidStateError")));
        }
        let header = format!("header:{}", inv.arg(0));
        realm.set(this, &header, inv.arg(1))?;
        Ok(HostValue::Undefined)
    })?;
    realm.define_method(prototype, "send", 1, |realm, inv| {
        let this = inv.receiver_object("send")?;
        if realm.get(this, "readyState")? != HostValue::Int(1) {
            return Err(HostError::Thrown(HostValue::from("InvalidStateError")));
        }
        realm.set(this, "readyState", HostValue::Int(4))?;
        realm.set(this, "status", HostValue::Int(200))?;
        Ok(HostValue::Undefined)
    })?;
    Ok(prototype)
}

/// `getContext` returns one cached context per type; unknown types yield
/// `null`.
fn build_canvas(realm: &mut Realm) -> Result<ObjectHandle, HostError> {
    let canvas = realm.alloc(None, Some("HTMLCanvasElement"));
    realm.set_own_data(canvas, "tagName", HostValue::from("CANVAS"))?;
    realm.set_own_data(canvas, "width", HostValue::Int(300))?;
    realm.set_own_data(canvas, "height", HostValue::Int(150))?;
    let contexts: RefCell<BTreeMap<String, ObjectHandle>> = RefCell::default();

    realm.define_method(canvas, "getContext", 1, move |realm, inv| {
        let Some(kind) = inv.arg(0).as_str().map(str::to_string) else {
            return Ok(HostValue::Null);
        };
        if let Some(existing) = contexts.borrow().get(&kind) {
            return Ok(HostValue::Object(*existing));
        }
        let context = match kind.as_str() {
            "2d" => drawing_context(realm)?,
            "webgl" | "webgl2" => gl_context(realm)?,
            _ => return Ok(HostValue::Null),
        };
        contexts.borrow_mut().insert(kind, context);
        Ok(HostValue::Object(context))
    })?;
    realm.define_method(canvas, "toDataURL", 0, |_, _| {
        Ok(HostValue::from("data:image/png;base64,"))
    })?;
    Ok(canvas)
}

fn drawing_context(realm: &mut Realm) -> Result<ObjectHandle, HostError> {
    let context = realm.alloc(None, Some("CanvasRenderingContext2D"));
    realm.define_method(context, "fillText", 3, |_, _| Ok(HostValue::Undefined))?;
    realm.define_method(context, "strokeText", 3, |_, _| Ok(HostValue::Undefined))?;
    realm.define_method(context, "measureText", 1, |realm, inv| {
        let metrics = realm.alloc(None, Some("TextMetrics"));
        let width = inv.arg(0).to_string().chars().count() as i64 * 6;
        realm.set_own_data(metrics, "width", HostValue::Int(width))?;
        Ok(HostValue::Object(metrics))
    })?;
    realm.define_method(context, "getImageData", 4, |realm, _| {
        Ok(HostValue::Object(realm.alloc(None, Some("ImageData"))))
    })?;
    Ok(context)
}

fn gl_context(realm: &mut Realm) -> Result<ObjectHandle, HostError> {
    let context = realm.alloc(None, Some("WebGLRenderingContext"));
    realm.define_method(context, "getParameter", 1, |_, inv| {
        Ok(match inv.arg(0) {
            HostValue::Int(0x1F00) => HostValue::from("WebKit"),
            HostValue::Int(0x1F01) => HostValue::from("WebKit WebGL"),
            _ => HostValue::Null,
        })
    })?;
    realm.define_method(context, "getExtension", 1, |_, _| Ok(HostValue::Null))?;
    realm.define_method(context, "getSupportedExtensions", 0, |realm, _| {
        Ok(HostValue::Object(collection(realm, "Array", &[])?))
    })?;
    Ok(context)
}
