// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the Modbus transport and the polling loop against a simulated PLC
//!
//! The simulated PLC is a tokio-modbus server exposing the pump data block
//! as holding registers, two bytes per register, high byte first.

use std::collections::HashMap;
use std::future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use approx::assert_relative_eq;
use tokio::net::TcpListener;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use rust_pump_scada::acquisition::{
    BlockAddress, FallbackGenerator, PlcPoller, PushDispatcher, SnapshotStore,
};
use rust_pump_scada::plc::modbus::ModbusTransport;
use rust_pump_scada::plc::{
    ConnectionManager, ConnectionSettings, PlcError, PlcTransport, ReadError, RegisterMap,
};

const REGISTER_BASE: u16 = 1000;

/// Holding registers shared between the test and the simulated PLC
#[derive(Clone, Default)]
struct SimulatedPlc {
    holding_registers: Arc<Mutex<HashMap<u16, u16>>>,
    online: Arc<Mutex<bool>>,
}

impl SimulatedPlc {
    fn load_block(&self, base: u16, block: &[u8]) {
        let mut registers = self.holding_registers.lock().unwrap();
        for (i, pair) in block.chunks(2).enumerate() {
            let high = pair[0];
            let low = pair.get(1).copied().unwrap_or(0);
            registers.insert(base + i as u16, u16::from_be_bytes([high, low]));
        }
    }

    fn set_online(&self, online: bool) {
        *self.online.lock().unwrap() = online;
    }
}

impl tokio_modbus::server::Service for SimulatedPlc {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        if !*self.online.lock().unwrap() {
            return future::ready(Err(ExceptionCode::ServerDeviceFailure));
        }
        let res = match req {
            Request::ReadHoldingRegisters(addr, cnt) => {
                let registers = self.holding_registers.lock().unwrap();
                (0..cnt)
                    .map(|i| registers.get(&(addr + i)).copied())
                    .collect::<Option<Vec<u16>>>()
                    .map(Response::ReadHoldingRegisters)
                    .ok_or(ExceptionCode::IllegalDataAddress)
            }
            _ => Err(ExceptionCode::IllegalFunction),
        };
        future::ready(res)
    }
}

async fn start_simulated_plc(plc: SimulatedPlc) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_addr = listener.local_addr().unwrap();

    let server = Server::new(listener);
    let new_service = move |_socket_addr| Ok(Some(plc.clone()));
    let on_connected = move |stream, socket_addr| {
        let new_service = new_service.clone();
        async move { accept_tcp_connection(stream, socket_addr, new_service) }
    };
    let on_process_error = |err| {
        eprintln!("Simulated PLC error: {}", err);
    };

    tokio::spawn(async move {
        if let Err(e) = server.serve(&on_connected, on_process_error).await {
            eprintln!("Simulated PLC stopped: {}", e);
        }
    });
    socket_addr
}

fn pump_block() -> Vec<u8> {
    let map = RegisterMap::standard();
    let mut block = vec![0u8; map.required_len()];
    // Pump 2 ready and running at 6.1 bar
    block[16] = 0x03;
    block[20..24].copy_from_slice(&6.1f32.to_be_bytes());
    block[24..28].copy_from_slice(&41.25f32.to_be_bytes());
    // System alarm
    block[112] = 0x01;
    block
}

#[tokio::test]
async fn test_read_block_through_holding_registers() {
    let plc = SimulatedPlc::default();
    plc.set_online(true);
    plc.load_block(REGISTER_BASE, &pump_block());
    let addr = start_simulated_plc(plc).await;

    let mut transport = ModbusTransport::new("127.0.0.1", addr.port(), 1, REGISTER_BASE);
    transport.connect().await.unwrap();
    assert!(transport.is_open());

    let block = pump_block();
    assert_eq!(transport.read_area(39, 0, 113).await.unwrap(), block);
    // Odd start and length cut inside registers
    assert_eq!(transport.read_area(39, 17, 9).await.unwrap(), block[17..26]);

    transport.disconnect().await;
    assert!(!transport.is_open());
}

#[tokio::test]
async fn test_exception_is_reported_as_read_error() {
    let plc = SimulatedPlc::default();
    plc.set_online(true);
    plc.load_block(REGISTER_BASE, &pump_block());
    let addr = start_simulated_plc(plc).await;

    // The registers below the base are not mapped
    let mut transport = ModbusTransport::new("127.0.0.1", addr.port(), 1, 0);
    transport.connect().await.unwrap();
    assert!(matches!(
        transport.read_area(39, 0, 113).await,
        Err(PlcError::Read(ReadError::Protocol(_)))
    ));
}

#[tokio::test]
async fn test_poller_switches_between_live_and_simulated() {
    let plc = SimulatedPlc::default();
    plc.set_online(true);
    plc.load_block(REGISTER_BASE, &pump_block());
    let addr = start_simulated_plc(plc.clone()).await;

    let map = Arc::new(RegisterMap::standard());
    let store = SnapshotStore::default();
    let dispatcher = Arc::new(PushDispatcher::new(8));
    let mut consumer = dispatcher.subscribe();
    let manager = ConnectionManager::new(
        Box::new(ModbusTransport::new("127.0.0.1", addr.port(), 1, REGISTER_BASE)),
        ConnectionSettings::default(),
    );
    let mut poller = PlcPoller::new(
        manager,
        map.clone(),
        BlockAddress::for_map(39, 0, &map).unwrap(),
        store.clone(),
        dispatcher.clone(),
        FallbackGenerator::with_seed(5),
        Duration::from_millis(50),
    );

    assert!(poller.poll_once().await.is_live());
    let live = store.current();
    assert!(!live.simulated);
    assert!(live.system_alarm);
    let pump_2 = live.pump(2).unwrap();
    assert!(pump_2.is_regulating());
    assert_relative_eq!(pump_2.pressure, 6.1, epsilon = 1e-5);
    assert_relative_eq!(pump_2.speed, 41.25);
    assert_eq!(consumer.next_snapshot().await.unwrap().generation, 1);

    plc.set_online(false);
    for _ in 0..3 {
        assert!(!poller.poll_once().await.is_live());
    }
    let fallback = store.current();
    assert!(fallback.simulated);
    assert!(!fallback.system_alarm);
    assert_eq!(fallback.generation, 4);

    plc.set_online(true);
    assert!(poller.poll_once().await.is_live());
    assert!(!store.current().simulated);
}
