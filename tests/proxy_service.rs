//! End-to-end tests: a proxy talking to the test service over a LocalBus.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use busbind_core::bus::{
    ExportId, MatchRule, MethodCall, ObjectDispatch, SignalMessage, SignalSink, WatchId,
};
use busbind_core::error::names;
use busbind_core::prelude::*;
use busbind_core::service::FORMAT_FAULT_MESSAGE;
use parking_lot::Mutex;

use common::{start, test_iface, BUS_NAME, OBJECT_PATH};

const WAIT: Duration = Duration::from_secs(2);

/// Run a remote call and hand back what its continuation received.
fn remote(proxy: &Proxy, method: &str, mut args: Vec<CallArg>) -> Result<Vec<Value>> {
    let (tx, rx) = mpsc::channel();
    args.push(CallArg::from(ReplyHandler::new(move |result| {
        let _ = tx.send(result);
    })));
    proxy.method(method)?.remote(args)?;
    rx.recv_timeout(WAIT).expect("continuation ran")
}

fn strings(items: &[&str]) -> Value {
    Value::from(items.to_vec())
}

/// LocalBus wrapper counting method calls handed to the transport.
struct CountingBus {
    inner: Arc<LocalBus>,
    sent: AtomicUsize,
}

#[async_trait]
impl BusTransport for CountingBus {
    fn unique_name(&self) -> &str {
        self.inner.unique_name()
    }

    fn send_blocking(
        &self,
        call: MethodCall,
        timeout: Option<Duration>,
        cancellable: Option<&CancellationToken>,
    ) -> Result<Variant> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.inner.send_blocking(call, timeout, cancellable)
    }

    async fn send(
        &self,
        call: MethodCall,
        cancellable: Option<CancellationToken>,
    ) -> Result<Variant> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.inner.send(call, cancellable).await
    }

    fn export_object(&self, path: &str, object: Arc<dyn ObjectDispatch>) -> Result<ExportId> {
        self.inner.export_object(path, object)
    }

    fn unexport(&self, id: ExportId) -> bool {
        self.inner.unexport(id)
    }

    fn emit_signal(&self, signal: SignalMessage) -> Result<()> {
        self.inner.emit_signal(signal)
    }

    fn watch_signals(&self, rule: MatchRule, sink: SignalSink) -> WatchId {
        self.inner.watch_signals(rule, sink)
    }

    fn unwatch_signals(&self, id: WatchId) -> bool {
        self.inner.unwatch_signals(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Initialization
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_build_sync_loads_properties() {
    let fixture = start();
    let proxy = fixture.proxy();

    assert_eq!(proxy.interface_name(), common::INTERFACE);
    assert_eq!(proxy.object_path(), OBJECT_PATH);
    assert_eq!(proxy.bus_name(), Some(BUS_NAME));
    assert_eq!(
        proxy.cached_property_names(),
        vec!["PropReadOnly".to_string(), "PropReadWrite".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_build_async() {
    let fixture = start();
    let proxy = ProxyBuilder::new(fixture.bus.clone(), test_iface())
        .bus_name(BUS_NAME)
        .object_path(OBJECT_PATH)
        .build()
        .await
        .unwrap();

    assert_eq!(proxy.get_property("PropReadOnly").unwrap(), Some(Value::Bool(true)));
}

#[test]
fn test_build_with_callback() {
    let fixture = start();
    let (tx, rx) = mpsc::channel();
    ProxyBuilder::new(fixture.bus.clone(), test_iface())
        .bus_name(BUS_NAME)
        .object_path(OBJECT_PATH)
        .build_with_callback(move |result| {
            let _ = tx.send(result);
        });

    let proxy = rx.recv_timeout(WAIT).unwrap().unwrap();
    let out = proxy.method("noInParameter").unwrap().sync(args![]).unwrap();
    assert_eq!(out, vec![Value::from("Yes!")]);
}

#[test]
fn test_build_against_unknown_name() {
    let fixture = start();
    // Property loading failures are not fatal; calls fail later.
    let proxy = ProxyBuilder::new(fixture.bus.clone(), test_iface())
        .bus_name("org.example.Nobody")
        .object_path(OBJECT_PATH)
        .build_sync()
        .unwrap();
    assert!(proxy.cached_property_names().is_empty());

    let err = proxy.method("noInParameter").unwrap().sync(args![]).unwrap_err();
    assert_eq!(err.remote_name(), Some(names::SERVICE_UNKNOWN));
}

#[test]
fn test_build_without_path() {
    let fixture = start();
    let err = ProxyBuilder::new(fixture.bus.clone(), test_iface())
        .build_sync()
        .unwrap_err();
    assert!(matches!(err, BusError::Config(_)));
}

// ─────────────────────────────────────────────────────────────────────────
// Method calls
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_frobate_stuff() {
    let fixture = start();
    let proxy = fixture.proxy();

    let out = remote(&proxy, "frobateStuff", args![Value::dict::<&str, Value, _>([])]).unwrap();
    assert_eq!(out.len(), 1);
    let hello = out[0].get("hello").and_then(Value::as_variant).unwrap();
    assert_eq!(hello.unpack(), Value::from("world"));
}

#[test]
fn test_always_throw_exception() {
    let fixture = start();
    let proxy = fixture.proxy();

    let err = remote(&proxy, "alwaysThrowException", args![Value::dict::<&str, Value, _>([])])
        .unwrap_err();
    assert_eq!(err.remote_name(), Some("org.busbind.Error.Exception"));
    assert!(err.to_string().contains("Exception!"));

    let err = proxy
        .method("alwaysThrowException")
        .unwrap()
        .sync(args![Value::dict::<&str, Value, _>([])])
        .unwrap_err();
    assert_eq!(err.remote_name(), Some("org.busbind.Error.Exception"));
}

#[test]
fn test_handler_error_namespace_from_config() {
    let bus = LocalBus::new();
    let service = Service::builder(test_iface())
        .handle("noInParameter", |_| -> std::result::Result<&'static str, HandlerError> {
            Err(HandlerError::new("Denied", "no"))
        })
        .unwrap()
        .config(ServiceConfig {
            error_namespace: "org.example.Errors".to_string(),
        })
        .build();
    service.export(bus.clone(), OBJECT_PATH).unwrap();

    let proxy = ProxyBuilder::new(bus.clone(), test_iface())
        .object_path(OBJECT_PATH)
        .build_sync()
        .unwrap();
    let err = proxy.method("noInParameter").unwrap().sync(args![]).unwrap_err();
    assert_eq!(err.remote_name(), Some("org.example.Errors.Denied"));

    let err = proxy.method("noReturnValue").unwrap().sync(args![]).unwrap_err();
    assert_eq!(err.remote_name(), Some("org.example.Errors.NotImplemented"));
}

#[test]
fn test_non_json_frobate_stuff() {
    let fixture = start();
    let proxy = fixture.proxy();

    let out = remote(&proxy, "nonJsonFrobateStuff", args![42i32]).unwrap();
    assert_eq!(out, vec![Value::from("42 it is!")]);
    let out = remote(&proxy, "nonJsonFrobateStuff", args![7i32]).unwrap();
    assert_eq!(out, vec![Value::from("Oops")]);
}

#[test]
fn test_no_in_parameter() {
    let fixture = start();
    let proxy = fixture.proxy();

    assert_eq!(
        remote(&proxy, "noInParameter", args![]).unwrap(),
        vec![Value::from("Yes!")]
    );
}

#[test]
fn test_multiple_in_args() {
    let fixture = start();
    let proxy = fixture.proxy();

    let out = remote(&proxy, "multipleInArgs", args![1i32, 2i32, 3i32, 4i32, 5i32]).unwrap();
    assert_eq!(out, vec![Value::from("1 2 3 4 5")]);
}

#[test]
fn test_no_return_value() {
    let fixture = start();
    let proxy = fixture.proxy();

    assert!(remote(&proxy, "noReturnValue", args![]).unwrap().is_empty());
    assert!(proxy.method("noReturnValue").unwrap().sync(args![]).unwrap().is_empty());
}

#[test]
fn test_emit_signal() {
    let fixture = start();
    let proxy = fixture.proxy();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    proxy
        .connect_signal("signalFoo", move |sender, args| {
            sink.lock().push((sender.to_string(), args.to_vec()));
        })
        .unwrap();

    proxy.method("emitSignal").unwrap().sync(args![]).unwrap();

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, fixture.bus.unique_name());
    assert_eq!(received[0].1, vec![Value::from("foobar")]);
}

#[test]
fn test_disconnect_from_signal_handler() {
    let fixture = start();
    let proxy = Arc::new(fixture.proxy());

    let count = Arc::new(AtomicUsize::new(0));
    let id = Arc::new(Mutex::new(None));
    let (counter, slot, weak) = (count.clone(), id.clone(), Arc::downgrade(&proxy));
    *id.lock() = Some(
        proxy
            .connect_signal("signalFoo", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let (Some(proxy), Some(id)) = (weak.upgrade(), *slot.lock()) {
                    proxy.disconnect_signal(id);
                }
            })
            .unwrap(),
    );

    proxy.method("emitSignal").unwrap().sync(args![]).unwrap();
    proxy.method("emitSignal").unwrap().sync(args![]).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_signal_without_arguments() {
    let fixture = start();
    let proxy = fixture.proxy();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    proxy
        .connect_signal("signalBare", move |_, args| sink.lock().push(args.to_vec()))
        .unwrap();

    fixture.service.emit_signal("signalBare", vec![]).unwrap();
    assert_eq!(*received.lock(), vec![Vec::<Value>::new()]);
}

#[test]
fn test_signals_filtered_by_bus_name() {
    let fixture = start();
    let proxy = ProxyBuilder::new(fixture.bus.clone(), test_iface())
        .bus_name("org.example.Elsewhere")
        .object_path(OBJECT_PATH)
        .build_sync()
        .unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    proxy
        .connect_signal("signalFoo", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    fixture.service.emit_signal("signalFoo", vec!["foobar".into()]).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    assert!(fixture.bus.own_name("org.example.Elsewhere"));
    fixture.service.emit_signal("signalFoo", vec!["foobar".into()]).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_connect_unknown_signal() {
    let fixture = start();
    let proxy = fixture.proxy();
    let err = proxy.connect_signal("signalBar", |_, _| {}).unwrap_err();
    assert!(matches!(err, BusError::NotFound { kind: "signal", .. }));
}

#[test]
fn test_multiple_out_values() {
    let fixture = start();
    let proxy = fixture.proxy();

    let out = remote(&proxy, "multipleOutValues", args![]).unwrap();
    assert_eq!(
        out,
        vec![Value::from("Hello"), Value::from("World"), Value::from("!")]
    );
}

#[test]
fn test_one_array_out() {
    let fixture = start();
    let proxy = fixture.proxy();

    // A single out argument is wrapped rather than spread.
    let out = remote(&proxy, "oneArrayOut", args![]).unwrap();
    assert_eq!(out, vec![strings(&["Hello", "World", "!"])]);
}

#[test]
fn test_array_of_array_out() {
    let fixture = start();
    let proxy = fixture.proxy();

    let out = remote(&proxy, "arrayOfArrayOut", args![]).unwrap();
    assert_eq!(
        out,
        vec![Value::Array(vec![
            strings(&["Hello", "World"]),
            strings(&["World", "Hello"]),
        ])]
    );
}

#[test]
fn test_multiple_array_out() {
    let fixture = start();
    let proxy = fixture.proxy();

    let out = remote(&proxy, "multipleArrayOut", args![]).unwrap();
    assert_eq!(
        out,
        vec![strings(&["Hello", "World"]), strings(&["World", "Hello"])]
    );
}

#[test]
fn test_array_out_bad_sig() {
    let fixture = start();
    let proxy = fixture.proxy();

    let err = remote(&proxy, "arrayOutBadSig", args![]).unwrap_err();
    assert_eq!(err.remote_name(), Some("org.busbind.Error.ValueError"));
    assert!(err.to_string().contains(FORMAT_FAULT_MESSAGE));
}

#[test]
fn test_async_implementation() {
    let fixture = start();
    let proxy = fixture.proxy();

    let out = remote(&proxy, "echo", args!["HelloWorld", 42i32]).unwrap();
    assert_eq!(out, vec![Value::from("HelloWorld"), Value::Int32(42)]);

    let out = proxy.method("echo").unwrap().sync(args!["HelloWorld", 42i32]).unwrap();
    assert_eq!(out, vec![Value::from("HelloWorld"), Value::Int32(42)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_call() {
    let fixture = start();
    let proxy = fixture.proxy();

    let out = proxy
        .call("echo", vec!["Hi".into(), 7i32.into()], CallOptions::new())
        .await
        .unwrap();
    assert_eq!(out, vec![Value::from("Hi"), Value::Int32(7)]);

    let pending = proxy
        .call_remote("noReturnValue", vec![], CallOptions::new(), None)
        .unwrap();
    tokio::time::timeout(WAIT, pending.wait()).await.unwrap();
}

#[test]
fn test_remote_without_continuation() {
    let fixture = start();
    let proxy = fixture.proxy();

    let pending = proxy
        .method("alwaysThrowException")
        .unwrap()
        .remote(args![Value::dict::<&str, Value, _>([])])
        .unwrap();
    assert_eq!(pending.method(), "alwaysThrowException");
    pending.wait_blocking();
}

#[test]
fn test_byte_echo() {
    let fixture = start();
    let proxy = fixture.proxy();

    for byte in [0u8, 63, 234] {
        let out = remote(&proxy, "byteEcho", args![byte]).unwrap();
        assert_eq!(out, vec![Value::Byte(byte)]);
    }
}

#[test]
fn test_byte_array_echo() {
    let fixture = start();
    let proxy = fixture.proxy();

    let bytes: Vec<u8> = b"\x00\x01\x02\xff".to_vec();
    let out = remote(&proxy, "byteArrayEcho", args![bytes.clone()]).unwrap();
    assert_eq!(out, vec![Value::from(bytes)]);
}

#[test]
fn test_struct_array() {
    let fixture = start();
    let proxy = fixture.proxy();

    let out = remote(&proxy, "structArray", args![]).unwrap();
    let items = out[0].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_struct().unwrap(), &[Value::Int32(128), Value::Int32(123456)]);
    assert_eq!(items[1].as_struct().unwrap(), &[Value::Int32(42), Value::Int32(654321)]);
}

#[test]
fn test_dict_echo() {
    let fixture = start();
    let proxy = fixture.proxy();

    let dict = Value::dict([
        ("anInteger", Variant::new("i", 10i32).unwrap()),
        ("aDoubleBeforeAndAfter", Variant::new("d", 10.5).unwrap()),
        ("aDoubleFromInteger", Variant::new("d", 10i32).unwrap()),
        ("aString", Variant::new("s", "a string").unwrap()),
    ]);
    let out = remote(&proxy, "dictEcho", args![dict]).unwrap();
    let echoed = &out[0];

    let get = |key: &str| echoed.get(key).and_then(Value::as_variant).unwrap().unpack();
    assert_eq!(get("anInteger"), Value::Int32(10));
    assert_eq!(get("aDoubleBeforeAndAfter"), Value::Double(10.5));
    assert_eq!(get("aDoubleFromInteger"), Value::Double(10.0));
    assert_eq!(get("aString"), Value::from("a string"));

    // Doubles never narrow into integer slots.
    let err = Variant::new("i", 10.5).unwrap_err();
    assert!(matches!(err, BusError::Encoding(_)));
}

#[test]
fn test_sync_and_remote_agree() {
    let fixture = start();
    let proxy = fixture.proxy();

    for method in ["multipleOutValues", "oneArrayOut", "multipleArrayOut", "structArray"] {
        let sync = proxy.method(method).unwrap().sync(args![]).unwrap();
        assert_eq!(remote(&proxy, method, args![]).unwrap(), sync, "{method}");
    }
}

#[test]
fn test_sync_ignores_trailing_continuation() {
    let fixture = start();
    let proxy = fixture.proxy();

    let called = Arc::new(AtomicUsize::new(0));
    let counter = called.clone();
    let out = proxy
        .method("noInParameter")
        .unwrap()
        .sync(args![ReplyHandler::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })])
        .unwrap();
    assert_eq!(out, vec![Value::from("Yes!")]);
    assert_eq!(called.load(Ordering::SeqCst), 0);
}

// ─────────────────────────────────────────────────────────────────────────
// Local failures
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_arity_errors() {
    let fixture = start();
    let proxy = fixture.proxy();
    let method = proxy.method("multipleInArgs").unwrap();

    let err = method.sync(args![1i32, 2i32]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Not enough arguments passed for method: multipleInArgs. Expected 5, got 2"
    );

    let err = method
        .remote(args![1i32, 2i32, 3i32, 4i32, 5i32, 6i32])
        .unwrap_err();
    assert!(matches!(err, BusError::TypeMismatch(_)));

    let err = proxy
        .method("noInParameter")
        .unwrap()
        .sync(args![1i32, 2i32, 3i32, 4i32, 5i32])
        .unwrap_err();
    assert!(err.to_string().starts_with("Too many arguments passed for method: noInParameter"));
}

#[test]
fn test_arity_error_sends_nothing() {
    let fixture = start();
    let bus = Arc::new(CountingBus {
        inner: fixture.bus.clone(),
        sent: AtomicUsize::new(0),
    });
    let proxy = ProxyBuilder::new(bus.clone(), test_iface())
        .bus_name(BUS_NAME)
        .object_path(OBJECT_PATH)
        .build_sync()
        .unwrap();
    let after_init = bus.sent.load(Ordering::SeqCst);
    assert_eq!(after_init, 1);

    let method = proxy.method("multipleInArgs").unwrap();
    assert!(matches!(method.sync(args![1i32]), Err(BusError::Arity(_))));
    assert!(matches!(method.remote(args![1i32, 2i32]), Err(BusError::Arity(_))));
    assert_eq!(bus.sent.load(Ordering::SeqCst), after_init);

    method.sync(args![1i32, 2i32, 3i32, 4i32, 5i32]).unwrap();
    assert_eq!(bus.sent.load(Ordering::SeqCst), after_init + 1);
}

#[test]
fn test_type_error_is_local() {
    let fixture = start();
    let proxy = fixture.proxy();

    let err = proxy
        .method("nonJsonFrobateStuff")
        .unwrap()
        .sync(args!["not a number"])
        .unwrap_err();
    assert!(matches!(err, BusError::Encoding(_)));
}

#[test]
fn test_unknown_method() {
    let fixture = start();
    let proxy = fixture.proxy();
    assert!(matches!(
        proxy.method("frobateEverything"),
        Err(BusError::NotFound { kind: "method", .. })
    ));
}

#[test]
fn test_missing_handler() {
    let fixture = start();
    let proxy = fixture.proxy();

    let err = proxy.method("notImplemented").unwrap().sync(args![]).unwrap_err();
    assert_eq!(err.remote_name(), Some("org.busbind.Error.NotImplemented"));
    assert!(err.to_string().contains("Method notImplemented is not implemented"));
}

#[test]
fn test_call_timeout() {
    let table = Arc::new(
        SignatureTable::new(InterfaceDescriptor::new("org.example.Slow").method("Hang", "", ""))
            .unwrap(),
    );
    let parked = Arc::new(Mutex::new(Vec::new()));
    let keep = parked.clone();
    let service = Service::builder(table.clone())
        .handle_async("Hang", move |_, invocation| keep.lock().push(invocation))
        .unwrap()
        .build();

    let bus = LocalBus::new();
    service.export(bus.clone(), "/slow").unwrap();
    let proxy = ProxyBuilder::new(bus.clone(), table)
        .object_path("/slow")
        .default_timeout(Duration::from_millis(50))
        .build_sync()
        .unwrap();

    let err = proxy.method("Hang").unwrap().sync(args![]).unwrap_err();
    assert!(matches!(err, BusError::Timeout(_)));

    let err = proxy
        .call_sync("Hang", vec![], CallOptions::new().timeout(Duration::from_millis(20)))
        .unwrap_err();
    assert!(matches!(err, BusError::Timeout(d) if d == Duration::from_millis(20)));

    let token = CancellationToken::new();
    let (tx, rx) = mpsc::channel();
    let pending = proxy
        .method("Hang")
        .unwrap()
        .remote(args![
            token.clone(),
            ReplyHandler::new(move |result| {
                let _ = tx.send(result);
            })
        ])
        .unwrap();
    pending.cancel();
    assert!(matches!(rx.recv_timeout(WAIT).unwrap(), Err(BusError::Cancelled)));
    assert!(parked.lock().len() >= 2);
}

#[test]
fn test_cancelled_before_send() {
    let fixture = start();
    let proxy = fixture.proxy();

    let token = CancellationToken::new();
    token.cancel();
    let err = proxy
        .call_sync("noInParameter", vec![], CallOptions::new().cancellable(token))
        .unwrap_err();
    assert!(matches!(err, BusError::Cancelled));
}

// ─────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────

#[test]
fn test_property_reads() {
    let fixture = start();
    let proxy = fixture.proxy();

    assert_eq!(proxy.get_property("PropReadOnly").unwrap(), Some(Value::Bool(true)));
    assert_eq!(
        proxy.get_property("PropReadWrite").unwrap(),
        Some(Value::from(
            Variant::new("u", common::PROP_READ_WRITE_INITIAL_VALUE).unwrap()
        ))
    );

    let err = proxy.get_property("PropWriteOnly").unwrap_err();
    assert!(matches!(err, BusError::PropertyAccess { access: "readable", .. }));
}

#[test]
fn test_property_writes() {
    let fixture = start();
    let proxy = fixture.proxy();

    proxy.set_property("PropWriteOnly", "Updated value").unwrap();
    proxy
        .set_property("PropReadWrite", Variant::new("s", "text").unwrap())
        .unwrap();

    // The cache is updated before the remote side confirms.
    assert_eq!(
        proxy.get_property("PropReadWrite").unwrap(),
        Some(Value::from(Variant::new("s", "text").unwrap()))
    );

    let properties = fixture.properties.clone();
    assert!(common::eventually(|| {
        *properties.write_only.read() == "Updated value"
            && *properties.read_write.read() == Value::from("text")
    }));

    let err = proxy.set_property("PropReadOnly", false).unwrap_err();
    assert!(matches!(err, BusError::PropertyAccess { access: "writable", .. }));
}

#[test]
fn test_property_changed_updates_cache() {
    let fixture = start();
    let proxy = fixture.proxy();

    fixture
        .service
        .emit_property_changed("PropReadWrite", Some(Variant::new("i", -3i32).unwrap().into()))
        .unwrap();
    assert_eq!(
        proxy.get_property("PropReadWrite").unwrap(),
        Some(Value::from(Variant::new("i", -3i32).unwrap()))
    );

    fixture.service.emit_property_changed("PropReadOnly", None).unwrap();
    assert_eq!(proxy.get_property("PropReadOnly").unwrap(), None);
}

#[test]
fn test_dropping_proxy_removes_watches() {
    let fixture = start();
    let before = fixture.bus.watcher_count();
    let proxy = fixture.proxy();
    assert_eq!(fixture.bus.watcher_count(), before + 2);
    drop(proxy);
    assert_eq!(fixture.bus.watcher_count(), before);
}

#[test]
fn test_unexported_service() {
    let fixture = start();
    let proxy = fixture.proxy();

    assert!(fixture.service.unexport());
    let err = proxy.method("noInParameter").unwrap().sync(args![]).unwrap_err();
    assert_eq!(err.remote_name(), Some(names::UNKNOWN_OBJECT));
    assert!(matches!(
        fixture.service.emit_signal("signalFoo", vec!["x".into()]),
        Err(BusError::NotExported)
    ));
}
