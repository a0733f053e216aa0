//! Composable wrappers around views.
//!
//! A [`Decorator`] turns one value into another; the router applies one to
//! every view it builds, and [`crate::view::NonAtomicRequests`] is a
//! decorator that exempts a view from request transactions.

pub trait Decorator<In> {
    type Out;

    fn decorate(&self, raw: In) -> Self::Out;
}

pub trait DecoratorExt<In>: Decorator<In> {
    /// Applies `self` first, then `decorator`.
    fn and_then<D>(self, decorator: D) -> DecoratorComposer<Self, D>
    where
        Self: Sized,
    {
        DecoratorComposer::new(self, decorator)
    }
}

impl<T: Decorator<In> + ?Sized, In> DecoratorExt<In> for T {}

/// The decorator a router starts with: views pass through unchanged.
#[derive(Default, Clone, Copy, Debug)]
pub struct IdentityDecorator;

impl<In> Decorator<In> for IdentityDecorator {
    type Out = In;

    #[inline]
    fn decorate(&self, raw: In) -> In {
        raw
    }
}

/// Two decorators applied one after the other, built by
/// [`DecoratorExt::and_then`].
#[derive(Debug, Clone, Copy)]
pub struct DecoratorComposer<D1, D2> {
    first: D1,
    second: D2,
}

impl<D1, D2> DecoratorComposer<D1, D2> {
    pub fn new(first: D1, second: D2) -> Self {
        Self { first, second }
    }
}

impl<In, D1, D2> Decorator<In> for DecoratorComposer<D1, D2>
where
    D1: Decorator<In>,
    D2: Decorator<D1::Out>,
{
    type Out = D2::Out;

    fn decorate(&self, raw: In) -> Self::Out {
        self.second.decorate(self.first.decorate(raw))
    }
}
