//! Fixed-radius, torus-hashed 2D container used for both the chunk circle
//! and every frontier level's tile circle.
//!
//! The disk of `(i,j)` offsets within `radius` is materialized once, sorted
//! nearest-first, so iteration gives free load priority without a heap.
//! Storage is a power-of-two square grid; a slot is addressed by masking the
//! absolute coordinates, so the grid wraps like a torus as the center moves
//! and no global rehash is ever required.

/// One `(di, dz)` offset from the circle's current center, at squared
/// distance `dist2`, in increasing-distance order.
#[derive(Debug, Clone, Copy)]
struct Offset {
    di: i32,
    dj: i32,
}

pub struct Circle<T> {
    radius: i32,
    /// Offsets from center, nearest-first.
    offsets: Vec<Offset>,
    /// `deltas[|i|]` = max `|j|` such that `(i,j)` is inside the disk; used
    /// for an O(1) "outside radius" test during `center`.
    deltas: Vec<i32>,
    /// Power-of-two-sized slot grid. `None` = empty slot.
    slots: Vec<Option<(i32, i32, T)>>,
    mask: i32,
    shift: u32,
    center_x: i32,
    center_z: i32,
}

impl<T> Circle<T> {
    /// Build a circle of the given integer `radius`. `radius` must be
    /// non-negative.
    ///
    /// # Panics
    /// Panics if `radius` is negative.
    #[must_use]
    pub fn new(radius: i32) -> Self {
        assert!(radius >= 0, "Circle::new: radius must be non-negative, got {radius}");

        let mut offsets = Vec::new();
        let r2 = radius * radius;
        for di in -radius..=radius {
            for dj in -radius..=radius {
                if di * di + dj * dj <= r2 {
                    offsets.push(Offset { di, dj });
                }
            }
        }
        offsets.sort_by_key(|o| o.di * o.di + o.dj * o.dj);

        let mut deltas = vec![0i32; (radius + 1) as usize];
        for o in &offsets {
            let ai = o.di.unsigned_abs() as usize;
            deltas[ai] = deltas[ai].max(o.dj.abs());
        }

        // Smallest power-of-two side that fits the disk's diameter with
        // headroom, so two live members never collide under the torus mask.
        let side = (radius * 2 + 1).max(1);
        let grid_side = side.next_power_of_two() * 2;
        let shift = grid_side.trailing_zeros();
        let mask = grid_side - 1;

        Self {
            radius,
            offsets,
            deltas,
            slots: (0..(grid_side * grid_side) as usize).map(|_| None).collect(),
            mask,
            shift,
            center_x: 0,
            center_z: 0,
        }
    }

    fn slot_index(&self, cx: i32, cz: i32) -> usize {
        (((cz & self.mask) << self.shift) | (cx & self.mask)) as usize
    }

    /// Insert `elem` at `(cx, cz)`.
    ///
    /// # Panics
    /// Panics if the target slot is already occupied (by construction, two
    /// live members of the disk never hash to the same slot; a slot already
    /// full here means the caller tried to insert over a live entry without
    /// disposing it first).
    pub fn set(&mut self, cx: i32, cz: i32, elem: T) {
        let idx = self.slot_index(cx, cz);
        assert!(self.slots[idx].is_none(), "Circle::set: slot ({cx},{cz}) already occupied");
        self.slots[idx] = Some((cx, cz, elem));
    }

    /// Look up the element stored at `(cx, cz)`, if the slot currently holds
    /// that exact coordinate pair (the slot may have been reused for a
    /// different coordinate after a `center` shift).
    #[must_use]
    pub fn get(&self, cx: i32, cz: i32) -> Option<&T> {
        let idx = self.slot_index(cx, cz);
        self.slots[idx].as_ref().and_then(|(sx, sz, v)| if *sx == cx && *sz == cz { Some(v) } else { None })
    }

    #[must_use]
    pub fn get_mut(&mut self, cx: i32, cz: i32) -> Option<&mut T> {
        let idx = self.slot_index(cx, cz);
        self.slots[idx].as_mut().and_then(|(sx, sz, v)| if *sx == cx && *sz == cz { Some(v) } else { None })
    }

    /// Remove and return whatever element lives at `(cx, cz)`, if its slot
    /// currently holds that coordinate pair.
    pub fn take(&mut self, cx: i32, cz: i32) -> Option<T> {
        let idx = self.slot_index(cx, cz);
        if matches!(&self.slots[idx], Some((sx, sz, _)) if *sx == cx && *sz == cz) {
            self.slots[idx].take().map(|(_, _, v)| v)
        } else {
            None
        }
    }

    /// Iterate live cells in nearest-first order relative to the current
    /// center. `f` returns `true` to stop early.
    pub fn each(&self, mut f: impl FnMut(i32, i32, &T) -> bool) {
        for o in &self.offsets {
            let cx = self.center_x + o.di;
            let cz = self.center_z + o.dj;
            if let Some(v) = self.get(cx, cz) {
                if f(cx, cz, v) {
                    return;
                }
            }
        }
    }

    /// Same as [`Self::each`] but with mutable access to each element.
    pub fn each_mut(&mut self, mut f: impl FnMut(i32, i32, &mut T) -> bool) {
        for o in &self.offsets {
            let cx = self.center_x + o.di;
            let cz = self.center_z + o.dj;
            if let Some(v) = self.get_mut(cx, cz) {
                if f(cx, cz, v) {
                    return;
                }
            }
        }
    }

    #[must_use]
    pub fn radius(&self) -> i32 {
        self.radius
    }

    #[must_use]
    pub fn center(&self) -> (i32, i32) {
        (self.center_x, self.center_z)
    }

    /// Shift the circle's center to `(cx, cz)`, disposing every live member
    /// that falls outside the new disk. `dispose` is called once per evicted
    /// element, with its coordinates, before it's dropped.
    pub fn recenter(&mut self, cx: i32, cz: i32, mut dispose: impl FnMut(i32, i32, T)) {
        self.center_x = cx;
        self.center_z = cz;

        for slot in &mut self.slots {
            let Some((sx, sz, _)) = slot else { continue };
            let dx = (*sx - cx).abs();
            let dz = (*sz - cz).abs();
            let outside = dx as usize >= self.deltas.len() || dz > self.deltas[dx as usize];
            if outside {
                let (sx, sz, v) = slot.take().unwrap();
                dispose(sx, sz, v);
            }
        }
    }
}
