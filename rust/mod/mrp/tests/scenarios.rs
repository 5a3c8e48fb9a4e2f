//! End-to-end scenarios against the public service API.

use std::sync::Arc;

use mrp::model::{
    BomComponent, BomInput, BomOperationInput, CreateOrderFromBomInput, CreateOrderInput,
    CreateProductInput, CreateWorkCenterInput, LedgerFilter, MoStatus, MovementType, NewMovement,
    OrderPlan, ProductCategory, WoStatus, WorkOrderFilter,
};
use mrp::service::{MrpService, scale_for_quantity};
use openmes_core::{ListParams, ServiceError};
use openmes_sql::{SQLStore, SqliteStore};

fn memory_store() -> Arc<dyn SQLStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}

fn product(svc: &MrpService, name: &str) -> String {
    svc.create_product(CreateProductInput {
        name: name.into(),
        uom: "pcs".into(),
        unit_cost: 1.0,
        category: ProductCategory::RawMaterial,
        is_component: true,
    })
    .unwrap()
    .id
}

fn work_center(svc: &MrpService, name: &str) -> String {
    svc.create_work_center(CreateWorkCenterInput {
        name: name.into(),
        cost_per_hour: 30.0,
    })
    .unwrap()
    .id
}

fn receive(svc: &MrpService, product_id: &str, quantity: f64) {
    svc.record_movement(NewMovement {
        product_id: product_id.into(),
        movement_type: MovementType::In,
        quantity,
        reference: None,
        unit_cost: None,
    })
    .unwrap();
}

fn bom(
    svc: &MrpService,
    product_id: &str,
    output_quantity: f64,
    components: &[(&str, f64)],
    operations: Vec<BomOperationInput>,
) -> String {
    svc.create_bom(BomInput {
        product_id: product_id.into(),
        name: "v1".into(),
        output_quantity,
        components: components
            .iter()
            .map(|(pid, qty)| BomComponent {
                product_id: pid.to_string(),
                qty_per_unit: *qty,
                uom: "pcs".into(),
            })
            .collect(),
        operations,
    })
    .unwrap()
    .id
}

fn from_bom(svc: &MrpService, bom_id: &str, quantity: f64) -> String {
    svc.create_order_from_bom(CreateOrderFromBomInput {
        bom_id: bom_id.into(),
        quantity,
        plan: OrderPlan::default(),
    })
    .unwrap()
    .id
}

fn out_movements(svc: &MrpService) -> usize {
    let filter = LedgerFilter {
        movement_type: Some(MovementType::Out),
        ..Default::default()
    };
    svc.list_entries(&filter, &ListParams::default()).unwrap().total
}

#[test]
fn chair_order_confirms_despite_shortfall() {
    let svc = MrpService::new(memory_store()).unwrap();
    let chair = product(&svc, "Chair");
    let leg = product(&svc, "Leg");
    let bom_id = bom(&svc, &chair, 10.0, &[(&leg, 2.0)], Vec::new());
    receive(&svc, &leg, 3.0);

    let preview = svc.preview_bom_scaling(&bom_id, 25.0).unwrap();
    assert_eq!(preview.components[0].required_qty, 5.0);

    let mo = from_bom(&svc, &bom_id, 25.0);
    let t = svc.confirm_order(&mo).unwrap();
    assert_eq!(t.order.status, MoStatus::Confirmed);
    assert_eq!(t.warnings.len(), 1);
    assert_eq!(t.warnings[0].code, "SHORTFALL");
    assert!(t.order.reserved_at.is_none());
    assert_eq!(out_movements(&svc), 0);
    assert_eq!(svc.get_order(&mo).unwrap().status, MoStatus::Confirmed);
}

#[test]
fn confirm_reserves_when_stock_covers() {
    let svc = MrpService::new(memory_store()).unwrap();
    let chair = product(&svc, "Chair");
    let leg = product(&svc, "Leg");
    let seat = product(&svc, "Seat");
    let bom_id = bom(&svc, &chair, 1.0, &[(&leg, 4.0), (&seat, 1.0)], Vec::new());
    receive(&svc, &leg, 10.0);
    receive(&svc, &seat, 5.0);

    let mo = from_bom(&svc, &bom_id, 2.0);
    let t = svc.confirm_order(&mo).unwrap();
    assert!(t.warnings.is_empty());
    assert!(t.order.reserved_at.is_some());

    assert_eq!(svc.on_hand(&leg).unwrap().on_hand, 2.0);
    assert_eq!(svc.on_hand(&seat).unwrap().on_hand, 3.0);

    let reference = t.order.reference.clone();
    let filter = LedgerFilter {
        reference: Some(reference),
        ..Default::default()
    };
    assert_eq!(svc.list_entries(&filter, &ListParams::default()).unwrap().total, 2);

    // A second reservation would double-post.
    let err = svc.reserve_components(&mo).unwrap_err();
    assert!(matches!(err, ServiceError::InvalidTransition(_)));
}

#[test]
fn reservation_is_all_or_nothing() {
    let svc = MrpService::with_hooks(memory_store(), Vec::new()).unwrap();
    let chair = product(&svc, "Chair");
    let leg = product(&svc, "Leg");
    let seat = product(&svc, "Seat");
    let bom_id = bom(&svc, &chair, 1.0, &[(&leg, 4.0), (&seat, 1.0)], Vec::new());
    receive(&svc, &leg, 100.0);
    receive(&svc, &seat, 1.0);

    let mo = from_bom(&svc, &bom_id, 3.0);
    svc.confirm_order(&mo).unwrap();
    let before = svc.list_entries(&LedgerFilter::default(), &ListParams::default()).unwrap().total;

    match svc.reserve_components(&mo) {
        Err(ServiceError::Shortfall(lines)) => {
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].product_id, seat);
            assert_eq!(lines[0].missing, 2.0);
        }
        other => panic!("expected shortfall, got {other:?}"),
    }

    let after = svc.list_entries(&LedgerFilter::default(), &ListParams::default()).unwrap().total;
    assert_eq!(before, after);
    assert_eq!(svc.on_hand(&leg).unwrap().on_hand, 100.0);
    assert!(svc.get_order(&mo).unwrap().reserved_at.is_none());
}

#[test]
fn concurrent_reservations_never_oversell() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn SQLStore> =
        Arc::new(SqliteStore::open(&dir.path().join("mes.sqlite")).unwrap());
    let svc = Arc::new(MrpService::with_hooks(store, Vec::new()).unwrap());
    let table = product(&svc, "Table");
    let top = product(&svc, "Top");
    let bom_id = bom(&svc, &table, 1.0, &[(&top, 5.0)], Vec::new());
    receive(&svc, &top, 6.0);

    let orders: Vec<String> = (0..4)
        .map(|_| {
            let mo = from_bom(&svc, &bom_id, 1.0);
            svc.confirm_order(&mo).unwrap();
            mo
        })
        .collect();

    let handles: Vec<_> = orders
        .into_iter()
        .map(|mo| {
            let svc = Arc::clone(&svc);
            std::thread::spawn(move || svc.reserve_components(&mo).is_ok())
        })
        .collect();
    let won = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(won, 1);
    assert_eq!(svc.on_hand(&top).unwrap().on_hand, 1.0);
}

#[test]
fn racing_confirms_reserve_once() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn SQLStore> =
        Arc::new(SqliteStore::open(&dir.path().join("mes.sqlite")).unwrap());
    let svc = Arc::new(MrpService::new(store).unwrap());
    let chair = product(&svc, "Chair");
    let leg = product(&svc, "Leg");
    let seat = product(&svc, "Seat");
    let bom_id = bom(&svc, &chair, 1.0, &[(&leg, 4.0), (&seat, 1.0)], Vec::new());
    receive(&svc, &leg, 100.0);
    receive(&svc, &seat, 100.0);
    let mo = from_bom(&svc, &bom_id, 2.0);

    let barrier = Arc::new(std::sync::Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let barrier = Arc::clone(&barrier);
            let mo = mo.clone();
            std::thread::spawn(move || {
                barrier.wait();
                svc.confirm_order(&mo)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let won = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::InvalidTransition(_))))
        .count();
    assert_eq!(won, 1);
    assert_eq!(refused, 1);

    assert_eq!(out_movements(&svc), 2);
    assert_eq!(svc.on_hand(&leg).unwrap().on_hand, 92.0);
    assert_eq!(svc.on_hand(&seat).unwrap().on_hand, 98.0);
    assert!(svc.get_order(&mo).unwrap().reserved_at.is_some());
}

#[test]
fn scaling_is_linear_in_target_quantity() {
    let svc = MrpService::new(memory_store()).unwrap();
    let chair = product(&svc, "Chair");
    let leg = product(&svc, "Leg");
    let bolt = product(&svc, "Bolt");
    let bom_id = bom(&svc, &chair, 4.0, &[(&leg, 4.0), (&bolt, 6.0)], Vec::new());
    let b = svc.get_bom(&bom_id).unwrap();

    for (x, y) in [(1.0, 3.0), (2.5, 7.5), (10.0, 0.4)] {
        let sx = scale_for_quantity(&b, x).unwrap();
        let sy = scale_for_quantity(&b, y).unwrap();
        let sum = scale_for_quantity(&b, x + y).unwrap();
        for i in 0..b.components.len() {
            let joined = sx.components[i].required_qty + sy.components[i].required_qty;
            assert!((sum.components[i].required_qty - joined).abs() < 1e-6);
        }
    }
    assert!(scale_for_quantity(&b, 0.0).is_err());
}

#[test]
fn on_hand_is_sum_of_movements() {
    let svc = MrpService::new(memory_store()).unwrap();
    let board = product(&svc, "Board");
    let moves = [
        (MovementType::In, 10.0),
        (MovementType::Out, 4.0),
        (MovementType::In, 2.5),
        (MovementType::Out, 8.0),
    ];
    for (movement_type, quantity) in moves {
        svc.record_movement(NewMovement {
            product_id: board.clone(),
            movement_type,
            quantity,
            reference: None,
            unit_cost: None,
        })
        .unwrap();
    }

    let level = svc.on_hand(&board).unwrap();
    assert_eq!(level.incoming, 12.5);
    assert_eq!(level.outgoing, 12.0);
    assert_eq!(level.on_hand, 0.5);
    assert_eq!(level.free_to_use, level.on_hand);
}

#[test]
fn resume_keeps_first_start_time() {
    let svc = MrpService::new(memory_store()).unwrap();
    let shelf = product(&svc, "Shelf");
    let ops = vec![BomOperationInput {
        name: "Sand".into(),
        work_center_id: None,
        sequence: 1,
        duration_mins: 20.0,
    }];
    let bom_id = bom(&svc, &shelf, 1.0, &[], ops);
    let mo = from_bom(&svc, &bom_id, 1.0);
    let filter = WorkOrderFilter {
        mo_id: Some(mo.clone()),
        ..Default::default()
    };
    let wo = svc.list_work_orders(&filter, &ListParams::default()).unwrap().items[0]
        .id
        .clone();

    let started = svc.start_work_order(&wo).unwrap().work_order.started_at;
    assert!(started.is_some());
    svc.pause_work_order(&wo).unwrap();
    let resumed = svc.resume_work_order(&wo).unwrap().work_order;
    assert_eq!(resumed.started_at, started);
    assert_eq!(resumed.status, WoStatus::InProgress);

    let done = svc.complete_work_order(&wo).unwrap();
    assert_eq!(done.work_order.status, WoStatus::Done);
    assert!(done.work_order.ended_at.is_some());
    assert_eq!(done.work_order.real_duration_mins, Some(0));
    assert!(done.progress.all_done());

    assert!(matches!(
        svc.start_work_order(&wo),
        Err(ServiceError::InvalidTransition(_))
    ));
}

#[test]
fn refused_transitions_leave_status_untouched() {
    let svc = MrpService::new(memory_store()).unwrap();
    let chair = product(&svc, "Chair");
    let mo = svc
        .create_order(CreateOrderInput {
            product_id: chair,
            quantity: 1.0,
            bom_id: None,
            plan: OrderPlan::default(),
        })
        .unwrap()
        .id;

    assert!(svc.start_order(&mo).is_err());
    assert!(svc.complete_order(&mo).is_err());
    assert_eq!(svc.get_order(&mo).unwrap().status, MoStatus::Draft);

    svc.confirm_order(&mo).unwrap();
    assert!(svc.confirm_order(&mo).is_err());
    assert!(svc.complete_order(&mo).is_err());
    assert_eq!(svc.get_order(&mo).unwrap().status, MoStatus::Confirmed);

    svc.start_order(&mo).unwrap();
    svc.start_order(&mo).unwrap();
    svc.complete_order(&mo).unwrap();
    for refused in [
        svc.confirm_order(&mo),
        svc.start_order(&mo),
        svc.cancel_order(&mo),
        svc.complete_order(&mo),
    ] {
        assert!(matches!(refused, Err(ServiceError::InvalidTransition(_))));
    }
    assert_eq!(svc.get_order(&mo).unwrap().status, MoStatus::Done);
    assert!(svc.delete_order(&mo).is_err());
}

#[test]
fn routing_fallback_uses_first_three_work_centers() {
    let svc = MrpService::new(memory_store()).unwrap();
    for name in ["Cutting", "Welding", "Painting", "Packing"] {
        work_center(&svc, name);
    }
    let frame = product(&svc, "Frame");
    let bom_id = bom(&svc, &frame, 1.0, &[], Vec::new());
    let mo = from_bom(&svc, &bom_id, 1.0);

    let filter = WorkOrderFilter {
        mo_id: Some(mo),
        ..Default::default()
    };
    let names: Vec<String> = svc
        .list_work_orders(&filter, &ListParams::default())
        .unwrap()
        .items
        .into_iter()
        .map(|w| w.operation_name)
        .collect();
    assert_eq!(
        names,
        [
            "Operation 1 - Cutting",
            "Operation 2 - Welding",
            "Operation 3 - Painting"
        ]
    );
}

#[test]
fn routing_fallback_with_few_or_no_work_centers() {
    let svc = MrpService::new(memory_store()).unwrap();
    let frame = product(&svc, "Frame");
    let bom_id = bom(&svc, &frame, 1.0, &[], Vec::new());

    let mo = from_bom(&svc, &bom_id, 1.0);
    let wos = svc.order_progress(&mo).unwrap();
    assert_eq!(wos.total, 1);
    let filter = WorkOrderFilter {
        mo_id: Some(mo),
        ..Default::default()
    };
    let only = svc.list_work_orders(&filter, &ListParams::default()).unwrap().items;
    assert_eq!(only[0].operation_name, "Operation 1 - Assembly");
    assert!(only[0].work_center_id.is_none());

    work_center(&svc, "Cutting");
    work_center(&svc, "Welding");
    let mo = from_bom(&svc, &bom_id, 1.0);
    assert_eq!(svc.order_progress(&mo).unwrap().total, 2);
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mes.sqlite");

    let (mo, reference) = {
        let svc = MrpService::new(Arc::new(SqliteStore::open(&path).unwrap())).unwrap();
        let chair = product(&svc, "Chair");
        let order = svc
            .create_order(CreateOrderInput {
                product_id: chair,
                quantity: 3.0,
                bom_id: None,
                plan: OrderPlan::default(),
            })
            .unwrap();
        (order.id, order.reference)
    };

    let svc = MrpService::new(Arc::new(SqliteStore::open(&path).unwrap())).unwrap();
    assert_eq!(svc.get_order(&mo).unwrap().reference, reference);

    let chair = svc.get_order(&mo).unwrap().product_id;
    let next = svc
        .create_order(CreateOrderInput {
            product_id: chair,
            quantity: 1.0,
            bom_id: None,
            plan: OrderPlan::default(),
        })
        .unwrap();
    assert_eq!(next.reference, "MO-00002");
}
