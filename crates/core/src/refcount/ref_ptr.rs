use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Atomically reference counted shared ownership of a backend object. Every clone (or [`RefPtr::share`]) increments
/// the counter embedded in the allocation, every drop decrements it, and `T` is dropped exactly once when the last
/// `RefPtr` is released. Increment and decrement are safe from any thread.
///
/// Back-references between objects use [`WeakRef`], which never keeps the target alive.
pub struct RefPtr<T: ?Sized>(Arc<T>);

impl<T> RefPtr<T> {
	pub fn new(value: T) -> Self {
		Self(Arc::new(value))
	}

	/// Construct an object that needs a non-owning link to itself during construction.
	pub fn new_cyclic(f: impl FnOnce(&WeakRef<T>) -> T) -> Self {
		Self(Arc::new_cyclic(|weak| {
			let weak = WeakRef(weak.clone());
			f(&weak)
		}))
	}
}

impl<T: ?Sized> RefPtr<T> {
	/// Share ownership, incrementing the reference count.
	#[inline]
	pub fn share(&self) -> Self {
		Self(self.0.clone())
	}

	/// Release this reference, decrementing the reference count and destroying the object if it was the last one.
	#[inline]
	pub fn release(self) {
		drop(self)
	}

	#[inline]
	pub fn ref_count(this: &Self) -> usize {
		Arc::strong_count(&this.0)
	}

	#[inline]
	pub fn downgrade(this: &Self) -> WeakRef<T> {
		WeakRef(Arc::downgrade(&this.0))
	}

	#[inline]
	pub fn ptr_eq(this: &Self, other: &Self) -> bool {
		Arc::ptr_eq(&this.0, &other.0)
	}

	#[inline]
	pub fn as_ptr(this: &Self) -> *const T {
		Arc::as_ptr(&this.0)
	}
}

impl<T: ?Sized> Clone for RefPtr<T> {
	#[inline]
	fn clone(&self) -> Self {
		self.share()
	}
}

impl<T: ?Sized> Deref for RefPtr<T> {
	type Target = T;

	#[inline]
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<T: ?Sized> PartialEq for RefPtr<T> {
	fn eq(&self, other: &Self) -> bool {
		Self::ptr_eq(self, other)
	}
}

impl<T: ?Sized> Eq for RefPtr<T> {}

impl<T: ?Sized> Hash for RefPtr<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		Self::as_ptr(self).cast::<()>().hash(state)
	}
}

impl<T: ?Sized + Debug> Debug for RefPtr<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		Debug::fmt(&*self.0, f)
	}
}

/// A non-owning link to an object managed by a [`RefPtr`]. It is not counted towards the object's lifetime and must
/// be upgraded before use.
pub struct WeakRef<T: ?Sized>(Weak<T>);

impl<T> WeakRef<T> {
	/// A link that never upgrades.
	pub const fn dangling() -> Self {
		Self(Weak::new())
	}
}

impl<T: ?Sized> WeakRef<T> {
	#[inline]
	pub fn upgrade(&self) -> Option<RefPtr<T>> {
		self.0.upgrade().map(RefPtr)
	}

	#[inline]
	pub fn is_alive(&self) -> bool {
		self.0.strong_count() > 0
	}

	#[inline]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Weak::ptr_eq(&self.0, &other.0)
	}
}

impl<T: ?Sized> Clone for WeakRef<T> {
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}

impl<T: ?Sized> Debug for WeakRef<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("WeakRef").field(&self.is_alive()).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;
	use std::sync::atomic::Ordering::Relaxed;
	use std::thread;

	struct DropCounter<'a>(&'a AtomicUsize);

	impl Drop for DropCounter<'_> {
		fn drop(&mut self) {
			self.0.fetch_add(1, Relaxed);
		}
	}

	#[test]
	fn test_destroyed_once_after_last_release() -> anyhow::Result<()> {
		let drops = AtomicUsize::new(0);
		let first = RefPtr::new(DropCounter(&drops));
		let shared = (0..7).map(|_| first.share()).collect::<Vec<_>>();
		assert_eq!(RefPtr::ref_count(&first), 8);

		for (i, ptr) in shared.into_iter().enumerate() {
			ptr.release();
			assert_eq!(drops.load(Relaxed), 0);
			assert_eq!(RefPtr::ref_count(&first), 7 - i);
		}
		first.release();
		assert_eq!(drops.load(Relaxed), 1);
		Ok(())
	}

	#[test]
	fn test_concurrent_share_release() -> anyhow::Result<()> {
		let drops = AtomicUsize::new(0);
		let ptr = RefPtr::new(DropCounter(&drops));
		thread::scope(|s| {
			for _ in 0..8 {
				let local = ptr.share();
				s.spawn(move || {
					for _ in 0..1000 {
						let a = local.share();
						let b = a.clone();
						drop(a);
						b.release();
					}
				});
			}
		});
		assert_eq!(RefPtr::ref_count(&ptr), 1);
		assert_eq!(drops.load(Relaxed), 0);
		drop(ptr);
		assert_eq!(drops.load(Relaxed), 1);
		Ok(())
	}

	#[test]
	fn test_weak_does_not_keep_alive() -> anyhow::Result<()> {
		let drops = AtomicUsize::new(0);
		let ptr = RefPtr::new(DropCounter(&drops));
		let weak = RefPtr::downgrade(&ptr);
		assert!(weak.is_alive());
		assert!(RefPtr::ptr_eq(&weak.upgrade().unwrap(), &ptr));
		assert_eq!(RefPtr::ref_count(&ptr), 1);

		drop(ptr);
		assert_eq!(drops.load(Relaxed), 1);
		assert!(!weak.is_alive());
		assert!(weak.upgrade().is_none());
		Ok(())
	}

	#[test]
	fn test_new_cyclic_self_link() -> anyhow::Result<()> {
		struct Node {
			this: WeakRef<Node>,
		}
		let node = RefPtr::new_cyclic(|this| Node { this: this.clone() });
		assert!(RefPtr::ptr_eq(&node.this.upgrade().unwrap(), &node));
		assert_eq!(RefPtr::ref_count(&node), 1);
		Ok(())
	}
}
