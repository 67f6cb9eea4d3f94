//! Shared fixture: the `org.busbind.Test` interface exported on a LocalBus.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use busbind_core::prelude::*;
use parking_lot::RwLock;

pub const BUS_NAME: &str = "org.busbind.Test";
pub const OBJECT_PATH: &str = "/org/busbind/Test";
pub const INTERFACE: &str = "org.busbind.Test";

pub const PROP_READ_WRITE_INITIAL_VALUE: u32 = 58;
pub const PROP_WRITE_ONLY_INITIAL_VALUE: &str = "Initial value";

pub fn test_iface() -> Arc<SignatureTable> {
    let descriptor = InterfaceDescriptor::new(INTERFACE)
        .method("nonJsonFrobateStuff", "i", "s")
        .method("frobateStuff", "a{sv}", "a{sv}")
        .method("alwaysThrowException", "a{sv}", "a{sv}")
        .method("noInParameter", "", "s")
        .method("multipleInArgs", "iiiii", "s")
        .method("noReturnValue", "", "")
        .method("emitSignal", "", "")
        .method("multipleOutValues", "", "sss")
        .method("oneArrayOut", "", "as")
        .method("arrayOfArrayOut", "", "aas")
        .method("multipleArrayOut", "", "asas")
        .method("arrayOutBadSig", "", "i")
        .method("byteArrayEcho", "ay", "ay")
        .method("byteEcho", "y", "y")
        .method("dictEcho", "a{sv}", "a{sv}")
        .method("echo", "si", "si")
        .method("structArray", "", "a(ii)")
        .method("notImplemented", "", "")
        .signal("signalFoo", "s")
        .signal("signalBare", "")
        .property("PropReadOnly", "b", PropertyAccess::Read)
        .property("PropWriteOnly", "s", PropertyAccess::Write)
        .property("PropReadWrite", "v", PropertyAccess::ReadWrite);
    Arc::new(SignatureTable::new(descriptor).expect("test interface is valid"))
}

/// Property values of the test object.
pub struct TestProperties {
    pub write_only: RwLock<String>,
    pub read_write: RwLock<Value>,
}

impl Default for TestProperties {
    fn default() -> Self {
        Self {
            write_only: RwLock::new(PROP_WRITE_ONLY_INITIAL_VALUE.to_string()),
            read_write: RwLock::new(Value::UInt32(PROP_READ_WRITE_INITIAL_VALUE)),
        }
    }
}

impl PropertyStore for TestProperties {
    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "PropReadOnly" => Some(Value::Bool(true)),
            "PropReadWrite" => {
                let current = self.read_write.read().clone();
                let signature = match current {
                    Value::UInt32(_) => "u",
                    Value::Int32(_) => "i",
                    Value::String(_) => "s",
                    _ => return None,
                };
                Variant::new(signature, current).ok().map(Value::from)
            }
            _ => None,
        }
    }

    fn set(&self, name: &str, value: Value) -> std::result::Result<(), HandlerError> {
        match (name, value) {
            ("PropWriteOnly", Value::String(s)) => *self.write_only.write() = s,
            ("PropReadWrite", Value::Variant(v)) => *self.read_write.write() = (*v).into_value(),
            (other, _) => return Err(HandlerError::new("InvalidValue", format!("cannot set {other}"))),
        }
        Ok(())
    }
}

pub struct Fixture {
    pub bus: Arc<LocalBus>,
    pub service: Arc<Service>,
    pub properties: Arc<TestProperties>,
}

impl Fixture {
    pub fn proxy(&self) -> Proxy {
        ProxyBuilder::new(self.bus.clone(), test_iface())
            .bus_name(BUS_NAME)
            .object_path(OBJECT_PATH)
            .build_sync()
            .expect("proxy initializes")
    }
}

fn strings(items: &[&str]) -> Value {
    Value::from(items.to_vec())
}

/// Build the test service, export it and own its name.
pub fn start() -> Fixture {
    let properties = Arc::new(TestProperties::default());
    let this: Arc<OnceLock<Weak<Service>>> = Arc::new(OnceLock::new());
    let emitter = this.clone();

    let service = Service::builder(test_iface())
        .handle("nonJsonFrobateStuff", |args| {
            Ok(if args[0] == Value::Int32(42) { "42 it is!" } else { "Oops" })
        })
        .unwrap()
        .handle("frobateStuff", |_| {
            Ok(Value::dict([("hello", Variant::new("s", "world").map_err(HandlerError::from)?)]))
        })
        .unwrap()
        .handle("alwaysThrowException", |_| -> std::result::Result<(), HandlerError> {
            Err(HandlerError::new("Exception", "Exception!"))
        })
        .unwrap()
        .handle("noInParameter", |_| Ok("Yes!"))
        .unwrap()
        .handle("multipleInArgs", |args| {
            let joined: Vec<String> = args.iter().map(ToString::to_string).collect();
            Ok(joined.join(" "))
        })
        .unwrap()
        .handle("noReturnValue", |_| Ok(()))
        .unwrap()
        .handle("emitSignal", move |_| {
            let service = emitter.get().and_then(Weak::upgrade);
            if let Some(service) = service {
                service.emit_signal("signalFoo", vec!["foobar".into()])?;
            }
            Ok(())
        })
        .unwrap()
        .handle("multipleOutValues", |_| Ok(strings(&["Hello", "World", "!"])))
        .unwrap()
        .handle("oneArrayOut", |_| Ok(strings(&["Hello", "World", "!"])))
        .unwrap()
        .handle("multipleArrayOut", |_| {
            Ok(Value::Array(vec![strings(&["Hello", "World"]), strings(&["World", "Hello"])]))
        })
        .unwrap()
        .handle("arrayOfArrayOut", |_| {
            Ok(Value::Array(vec![strings(&["Hello", "World"]), strings(&["World", "Hello"])]))
        })
        .unwrap()
        .handle("arrayOutBadSig", |_| Ok(strings(&["Hello", "World", "!"])))
        .unwrap()
        .handle("byteArrayEcho", |mut args| Ok(args.remove(0)))
        .unwrap()
        .handle("byteEcho", |mut args| Ok(args.remove(0)))
        .unwrap()
        .handle("dictEcho", |mut args| Ok(args.remove(0)))
        .unwrap()
        .handle_async("echo", |args, invocation| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                invocation.return_values(args);
            });
        })
        .unwrap()
        .handle("structArray", |_| {
            Ok(Value::Array(vec![
                Value::Struct(vec![128i32.into(), 123456i32.into()]),
                Value::Struct(vec![42i32.into(), 654321i32.into()]),
            ]))
        })
        .unwrap()
        .with_properties(properties.clone())
        .build();

    let service = Arc::new(service);
    let _ = this.set(Arc::downgrade(&service));

    let bus = LocalBus::new();
    bus.own_name(BUS_NAME);
    service.export(bus.clone(), OBJECT_PATH).unwrap();

    Fixture {
        bus,
        service,
        properties,
    }
}

/// Poll `check` until it holds or a second passes.
pub fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}
