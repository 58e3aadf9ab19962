//! Two engines wired through in-memory peer links.

use kurbo::Point;
use rasterboard_core::{PaintEngine, PeerLink, Rgba, ToolKind};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A peer link whose outbox the test drains and delivers by hand.
struct ChannelLink {
    id: String,
    outbox: Rc<RefCell<VecDeque<String>>>,
}

impl ChannelLink {
    fn new(id: &str) -> (Self, Rc<RefCell<VecDeque<String>>>) {
        let outbox = Rc::new(RefCell::new(VecDeque::new()));
        (
            Self {
                id: id.to_string(),
                outbox: outbox.clone(),
            },
            outbox,
        )
    }
}

impl PeerLink for ChannelLink {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        true
    }

    fn send(&mut self, message: &str) -> Result<(), String> {
        self.outbox.borrow_mut().push_back(message.to_string());
        Ok(())
    }
}

fn deliver(from: &Rc<RefCell<VecDeque<String>>>, to: &mut PaintEngine) {
    while let Some(raw) = from.borrow_mut().pop_front() {
        to.handle_message(&raw);
    }
}

fn pair() -> (PaintEngine, PaintEngine, Rc<RefCell<VecDeque<String>>>, Rc<RefCell<VecDeque<String>>>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut a = PaintEngine::new(32, 32);
    let mut b = PaintEngine::new(32, 32);
    let (link_ab, a_out) = ChannelLink::new("b");
    let (link_ba, b_out) = ChannelLink::new("a");
    a.attach_peer(Box::new(link_ab));
    b.attach_peer(Box::new(link_ba));
    (a, b, a_out, b_out)
}

#[test]
fn brush_stroke_replays_on_peer() {
    let (mut a, mut b, a_out, _) = pair();
    a.set_color(Rgba::new(255, 0, 0, 255));
    a.pointer_down(Point::new(4.0, 16.0));
    a.pointer_move(Point::new(16.0, 16.0));
    a.pointer_move(Point::new(28.0, 16.0));
    a.pointer_up(Point::new(28.0, 16.0));

    // One message per move segment.
    assert_eq!(a_out.borrow().len(), 2);
    deliver(&a_out, &mut b);

    // Functional replay equivalence: same endpoints, color, width.
    for x in [4, 16, 28] {
        assert_eq!(b.output().pixel(x, 16), Some(Rgba::new(255, 0, 0, 255)));
    }
    // Remote strokes never pollute the receiving user's undo history.
    assert!(!b.can_undo());
}

#[test]
fn shape_gesture_emits_single_op() {
    let (mut a, mut b, a_out, _) = pair();
    a.set_tool(ToolKind::Rect);
    a.pointer_down(Point::new(4.0, 4.0));
    a.pointer_move(Point::new(20.0, 12.0));
    a.pointer_move(Point::new(28.0, 28.0));
    a.pointer_up(Point::new(28.0, 28.0));

    // Previews stay local; only the completed shape travels.
    assert_eq!(a_out.borrow().len(), 1);
    deliver(&a_out, &mut b);
    assert_eq!(b.output().pixel(16, 4), a.output().pixel(16, 4));
    assert_eq!(b.output().pixel(16, 16), Some(Rgba::transparent()));
}

#[test]
fn clear_propagates_to_peers() {
    let (mut a, mut b, a_out, b_out) = pair();
    b.pointer_down(Point::new(8.0, 8.0));
    b.pointer_move(Point::new(24.0, 8.0));
    b.pointer_up(Point::new(24.0, 8.0));
    deliver(&b_out, &mut a);
    assert!(a.output().pixel(16, 8).unwrap().a > 0);

    a.clear();
    deliver(&a_out, &mut b);
    assert_eq!(a.output().pixel(16, 8), Some(Rgba::transparent()));
    assert_eq!(b.output().pixel(16, 8), Some(Rgba::transparent()));
}

#[test]
fn unknown_layer_falls_back_to_active() {
    let (mut a, mut b, a_out, _) = pair();
    // A draws on a layer B has never heard of.
    a.add_layer("Ink");
    a.pointer_down(Point::new(10.0, 10.0));
    a.pointer_move(Point::new(22.0, 10.0));
    a.pointer_up(Point::new(22.0, 10.0));
    deliver(&a_out, &mut b);

    // Applied deterministically to B's active layer rather than dropped.
    assert!(b.output().pixel(16, 10).unwrap().a > 0);
}

#[test]
fn concurrent_overlapping_strokes_may_diverge() {
    // No cross-peer ordering is enforced, so two peers that apply the same
    // pair of non-commutative operations in opposite orders legitimately end
    // up with different pixels. This pins down the documented weakness.
    let (mut a, mut b, a_out, b_out) = pair();
    a.set_color(Rgba::new(255, 0, 0, 255));
    b.set_color(Rgba::new(0, 0, 255, 255));

    // Both draw across the same region "simultaneously": each applies its
    // own stroke before the remote one arrives.
    a.pointer_down(Point::new(4.0, 16.0));
    a.pointer_move(Point::new(28.0, 16.0));
    a.pointer_up(Point::new(28.0, 16.0));
    b.pointer_down(Point::new(16.0, 4.0));
    b.pointer_move(Point::new(16.0, 28.0));
    b.pointer_up(Point::new(16.0, 28.0));

    deliver(&a_out, &mut b);
    deliver(&b_out, &mut a);

    // At the crossing, A sees blue-over-red and B sees red-over-blue.
    assert_eq!(a.output().pixel(16, 16), Some(Rgba::new(0, 0, 255, 255)));
    assert_eq!(b.output().pixel(16, 16), Some(Rgba::new(255, 0, 0, 255)));
}
