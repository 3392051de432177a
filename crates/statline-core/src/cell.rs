//! Bound cells: the unit a sheet section edits and displays.
//!
//! A [`BoundCell`] pairs an editable base value with a display value that
//! its [`Trigger`] computes. This module provides:
//! - [`Floor`] - The lowest value a computed display may show
//! - [`Combiner`] - How a base and a formula value are folded together
//! - [`Trigger`] - The closed set of ways a display is derived
//! - [`CellSpec`] - Everything needed to bind a cell to a sheet
//! - [`BoundCell`] - The live cell, refreshed by the [`Refresher`]

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use statline_engine::engine::{Environment, FormulaStore, VarName, format_number};

use crate::base_values::BaseValues;
use crate::error::Result;
use crate::refresher::{Refresher, Subscriber, SubscriberId};

/// Lower bound applied to a computed display value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Floor {
    /// Displays never go below zero.
    #[default]
    Zero,
    /// Cost-style values may go down to -100.
    Cost,
    Unbounded,
}

impl Floor {
    pub fn bound(self) -> f64 {
        match self {
            Floor::Zero => 0.0,
            Floor::Cost => -100.0,
            Floor::Unbounded => f64::NEG_INFINITY,
        }
    }

    pub fn apply(self, value: f64) -> f64 {
        value.max(self.bound())
    }
}

/// Folds `(base, formula value)` into a display value.
#[derive(Clone, Default)]
pub enum Combiner {
    #[default]
    AddBase,
    Custom(Rc<dyn Fn(f64, f64) -> f64>),
}

impl Combiner {
    pub fn custom(f: impl Fn(f64, f64) -> f64 + 'static) -> Self {
        Combiner::Custom(Rc::new(f))
    }

    pub fn combine(&self, base: f64, value: f64) -> f64 {
        match self {
            Combiner::AddBase => base + value,
            Combiner::Custom(f) => f(base, value),
        }
    }
}

impl fmt::Debug for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combiner::AddBase => write!(f, "AddBase"),
            Combiner::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// How a cell turns its base into a display value.
#[derive(Clone, Debug, Default)]
pub enum Trigger {
    /// Display the base as-is.
    #[default]
    PassThrough,
    /// Display a variable read from the environment.
    Formula { variable: VarName, floor: Floor },
    /// Display the base combined with a variable read from the environment.
    Combine {
        variable: VarName,
        combiner: Combiner,
        floor: Floor,
    },
}

impl Trigger {
    /// The variable this trigger displays, if any.
    pub fn variable(&self) -> Option<&VarName> {
        match self {
            Trigger::PassThrough => None,
            Trigger::Formula { variable, .. } | Trigger::Combine { variable, .. } => {
                Some(variable)
            }
        }
    }

    pub fn floor(&self) -> Option<Floor> {
        match self {
            Trigger::PassThrough => None,
            Trigger::Formula { floor, .. } | Trigger::Combine { floor, .. } => Some(*floor),
        }
    }

    pub fn apply(&self, base: f64, env: &Environment<'_>) -> Result<f64> {
        Ok(match self {
            Trigger::PassThrough => base,
            Trigger::Formula { variable, floor } => floor.apply(env.read(variable)?),
            Trigger::Combine {
                variable,
                combiner,
                floor,
            } => floor.apply(combiner.combine(base, env.read(variable)?)),
        })
    }
}

/// Description of a cell to bind; see [`crate::Sheet::bind`].
#[derive(Clone, Debug)]
pub struct CellSpec {
    /// Base variable the cell edits. `None` for a cell that only displays.
    pub base: Option<VarName>,
    pub trigger: Trigger,
    pub minimum: f64,
    pub maximum: f64,
    pub default: f64,
}

impl Default for CellSpec {
    fn default() -> Self {
        CellSpec {
            base: None,
            trigger: Trigger::PassThrough,
            minimum: f64::NEG_INFINITY,
            maximum: f64::INFINITY,
            default: 0.0,
        }
    }
}

impl CellSpec {
    /// An editable field showing its own base value.
    pub fn pass_through(base: VarName) -> Self {
        CellSpec {
            base: Some(base),
            ..Default::default()
        }
    }

    /// A display of `variable`, floored at zero.
    pub fn formula(variable: VarName) -> Self {
        CellSpec {
            trigger: Trigger::Formula {
                variable,
                floor: Floor::Zero,
            },
            ..Default::default()
        }
    }

    /// An editable field for `base` displaying `combiner(base, variable)`.
    pub fn combine(base: VarName, variable: VarName, combiner: Combiner) -> Self {
        CellSpec {
            base: Some(base),
            trigger: Trigger::Combine {
                variable,
                combiner,
                floor: Floor::Zero,
            },
            ..Default::default()
        }
    }

    pub fn with_base(mut self, base: VarName) -> Self {
        self.base = Some(base);
        self
    }

    /// Ignored for pass-through cells.
    pub fn with_floor(mut self, value: Floor) -> Self {
        match &mut self.trigger {
            Trigger::PassThrough => {}
            Trigger::Formula { floor, .. } | Trigger::Combine { floor, .. } => *floor = value,
        }
        self
    }

    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }
}

/// A live cell. Create one through [`crate::Sheet::bind`].
pub struct BoundCell {
    base_var: Option<VarName>,
    trigger: Trigger,
    store: Rc<FormulaStore>,
    values: BaseValues,
    refresher: Rc<Refresher>,
    /// Base of a cell without a base variable, and the last written base
    /// otherwise.
    base: Cell<f64>,
    minimum: Cell<f64>,
    maximum: Cell<f64>,
    default: f64,
    display: Cell<f64>,
    id: Cell<Option<SubscriberId>>,
}

impl BoundCell {
    pub(crate) fn new(
        spec: CellSpec,
        store: Rc<FormulaStore>,
        values: BaseValues,
        refresher: Rc<Refresher>,
    ) -> Self {
        let initial = spec
            .base
            .as_ref()
            .and_then(|name| values.get(name).or_else(|| store.base_default(name)))
            .unwrap_or(spec.default);
        BoundCell {
            base_var: spec.base,
            trigger: spec.trigger,
            store,
            values,
            refresher,
            base: Cell::new(initial),
            minimum: Cell::new(spec.minimum),
            maximum: Cell::new(spec.maximum),
            default: spec.default,
            display: Cell::new(0.0),
            id: Cell::new(None),
        }
    }

    pub(crate) fn set_subscriber_id(&self, id: SubscriberId) {
        self.id.set(Some(id));
    }

    pub fn subscriber_id(&self) -> Option<SubscriberId> {
        self.id.get()
    }

    pub fn base_var(&self) -> Option<&VarName> {
        self.base_var.as_ref()
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Current base. Bound cells read it back from the shared base values,
    /// so a write made elsewhere is seen on the next refresh.
    pub fn base(&self) -> f64 {
        self.base_var
            .as_ref()
            .and_then(|name| self.values.get(name))
            .unwrap_or(self.base.get())
    }

    pub fn display(&self) -> f64 {
        self.display.get()
    }

    /// The display value as text.
    pub fn shown(&self) -> String {
        format_number(self.display.get())
    }

    pub fn minimum(&self) -> f64 {
        self.minimum.get()
    }

    pub fn maximum(&self) -> f64 {
        self.maximum.get()
    }

    pub fn default(&self) -> f64 {
        self.default
    }

    fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default;
        }
        value.max(self.minimum.get()).min(self.maximum.get())
    }

    /// Store a clamped base without recomputing or signalling anything.
    /// Returns the stored value.
    pub fn set_base_quiet(&self, value: f64) -> f64 {
        let value = self.clamp(value);
        self.base.set(value);
        if let Some(name) = &self.base_var {
            self.values.set(name, value);
        }
        value
    }

    /// Store a clamped base, recompute the display and refresh everything
    /// that depends on the base variable, other cells editing it included.
    /// Returns how many subscribers the refresher updated.
    pub fn set_base(&self, value: f64) -> Result<usize> {
        self.set_base_quiet(value);
        self.recompute()?;
        match (&self.base_var, self.id.get()) {
            (Some(name), Some(id)) => self.refresher.refresh_except(name, id),
            (Some(name), None) => self.refresher.refresh(name),
            (None, _) => Ok(0),
        }
    }

    /// Reset the base to the cell's default.
    pub fn clear(&self) -> Result<usize> {
        self.set_base(self.default)
    }

    /// Raise the lower bound, pulling the base up to it if needed.
    pub fn set_minimum(&self, minimum: f64) -> Result<usize> {
        self.minimum.set(minimum);
        self.reclamp()
    }

    /// Lower the upper bound, pulling the base down to it if needed.
    pub fn set_maximum(&self, maximum: f64) -> Result<usize> {
        self.maximum.set(maximum);
        self.reclamp()
    }

    fn reclamp(&self) -> Result<usize> {
        let base = self.base();
        if self.clamp(base) == base {
            return Ok(0);
        }
        self.set_base(base)
    }

    /// Re-run the trigger against the current base.
    pub fn recompute(&self) -> Result<f64> {
        let env = Environment::runtime(&self.store, &self.values);
        let display = self.trigger.apply(self.base(), &env)?;
        self.display.set(display);
        Ok(display)
    }
}

impl Subscriber for BoundCell {
    fn refresh(&self) -> Result<()> {
        self.recompute()?;
        Ok(())
    }
}

impl fmt::Debug for BoundCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCell")
            .field("base_var", &self.base_var)
            .field("trigger", &self.trigger)
            .field("base", &self.base())
            .field("display", &self.display.get())
            .finish()
    }
}
