use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::events::{InputEvent, InputKind};

type Handler<T> = Box<dyn FnMut(&mut T, &InputEvent)>;

struct Slot<T> {
    kind: InputKind,
    handler: Handler<T>,
}

type Slots<T> = RefCell<Vec<Option<Slot<T>>>>;

/// Routes host input to registered handlers by input kind.
pub struct InputRouter<T> {
    slots: Rc<Slots<T>>,
}

impl<T: 'static> InputRouter<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn subscribe(
        &self,
        kind: InputKind,
        handler: impl FnMut(&mut T, &InputEvent) + 'static,
    ) -> Subscription {
        let mut slots = self.slots.borrow_mut();
        let slot = Slot {
            kind,
            handler: Box::new(handler),
        };
        let index = match slots.iter().position(Option::is_none) {
            Some(free) => {
                slots[free] = Some(slot);
                free
            }
            None => {
                slots.push(Some(slot));
                slots.len() - 1
            }
        };
        let registry: Weak<Slots<T>> = Rc::downgrade(&self.slots);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(slots) = registry.upgrade() {
                    if let Some(entry) = slots.borrow_mut().get_mut(index) {
                        *entry = None;
                    }
                }
            })),
        }
    }

    /// Deliver `event` to every handler for its kind. Returns how many ran.
    pub fn dispatch(&self, target: &mut T, event: &InputEvent) -> usize {
        let kind = event.kind();
        let mut slots = self.slots.borrow_mut();
        let mut delivered = 0;
        for slot in slots.iter_mut().flatten() {
            if slot.kind == kind {
                (slot.handler)(target, event);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.slots.borrow().iter().flatten().count()
    }
}

impl<T: 'static> Default for InputRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One registered handler. Dropping it unsubscribes.
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

/// Everything a setup call registered, released together.
#[derive(Default)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn dispose(&mut self) {
        self.subscriptions.clear();
    }
}

impl Extend<Subscription> for SubscriptionSet {
    fn extend<I: IntoIterator<Item = Subscription>>(&mut self, iter: I) {
        self.subscriptions.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NudgeDirection;

    #[test]
    fn routes_by_kind() {
        let router: InputRouter<Vec<&'static str>> = InputRouter::new();
        let mut set = SubscriptionSet::default();
        set.push(router.subscribe(InputKind::Wheel, |log, _| log.push("wheel")));
        set.push(router.subscribe(InputKind::Keyboard, |log, _| log.push("key")));

        let mut log = Vec::new();
        assert_eq!(router.dispatch(&mut log, &InputEvent::Wheel { delta_y: 3.0 }), 1);
        assert_eq!(
            router.dispatch(&mut log, &InputEvent::Key(NudgeDirection::Left)),
            1
        );
        assert_eq!(router.dispatch(&mut log, &InputEvent::PointerLeft), 0);
        assert_eq!(log, vec!["wheel", "key"]);
    }

    #[test]
    fn dispose_releases_every_handler() {
        let router: InputRouter<u32> = InputRouter::new();
        let mut set = SubscriptionSet::default();
        set.extend([
            router.subscribe(InputKind::Wheel, |n, _| *n += 1),
            router.subscribe(InputKind::Pointer, |n, _| *n += 1),
            router.subscribe(InputKind::Resize, |n, _| *n += 1),
        ]);
        assert_eq!(router.listener_count(), 3);

        set.dispose();
        assert_eq!(router.listener_count(), 0);
        let mut n = 0;
        router.dispatch(&mut n, &InputEvent::Wheel { delta_y: 1.0 });
        assert_eq!(n, 0);
    }

    #[test]
    fn dropping_the_set_also_releases() {
        let router: InputRouter<u32> = InputRouter::new();
        {
            let mut set = SubscriptionSet::default();
            set.push(router.subscribe(InputKind::Wheel, |n, _| *n += 1));
            assert_eq!(router.listener_count(), 1);
        }
        assert_eq!(router.listener_count(), 0);
    }

    #[test]
    fn outliving_the_router_is_harmless() {
        let router: InputRouter<u32> = InputRouter::new();
        let sub = router.subscribe(InputKind::Wheel, |n, _| *n += 1);
        drop(router);
        sub.unsubscribe();
    }
}
