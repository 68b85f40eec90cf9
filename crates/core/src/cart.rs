//! Session cart.
//!
//! The cart is a flat list of line items keyed by product. It is serialized
//! into the visitor's server-side session and rebuilt on every request, so
//! everything here is plain data with no I/O.

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId};

/// Errors from cart mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Adding one more unit would exceed the stock on hand.
    #[error("Only {available} of {name} in stock")]
    OutOfStock {
        /// Product name, for the flash message.
        name: String,
        /// Units available.
        available: u32,
    },
    /// The product is not in the cart.
    #[error("Product {0} is not in your cart")]
    NotInCart(ProductId),
}

/// The product facts needed to put something in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartProduct {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_url: Option<String>,
    pub stock_quantity: u32,
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Price,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub stock_quantity: u32,
}

impl CartItem {
    /// Price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }

    /// Whether another unit can be added.
    #[must_use]
    pub const fn can_increase(&self) -> bool {
        self.quantity < self.stock_quantity
    }
}

/// A visitor's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Line items in the order they were first added.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add one unit of a product.
    ///
    /// A new product enters with quantity 1; a product already in the cart
    /// goes up by one. Name, price, image and stock are refreshed from
    /// `product` either way.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::OutOfStock`] if the new quantity would exceed
    /// `product.stock_quantity`.
    pub fn add(&mut self, product: CartProduct) -> Result<(), CartError> {
        let current = self.quantity_of(product.product_id);
        if current >= product.stock_quantity {
            return Err(CartError::OutOfStock {
                name: product.name,
                available: product.stock_quantity,
            });
        }

        match self.find_mut(product.product_id) {
            Some(item) => {
                item.quantity += 1;
                item.name = product.name;
                item.price = product.price;
                item.image_url = product.image_url;
                item.stock_quantity = product.stock_quantity;
            }
            None => self.items.push(CartItem {
                product_id: product.product_id,
                name: product.name,
                price: product.price,
                image_url: product.image_url,
                quantity: 1,
                stock_quantity: product.stock_quantity,
            }),
        }
        Ok(())
    }

    /// Add one unit of a product already in the cart.
    ///
    /// Name, price, image and stock are refreshed from `product` first, so
    /// the limit is the current stock rather than the stock when the line
    /// was added.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] for an unknown product and
    /// [`CartError::OutOfStock`] at the stock limit.
    pub fn increase(&mut self, product: CartProduct) -> Result<(), CartError> {
        let item = self
            .find_mut(product.product_id)
            .ok_or(CartError::NotInCart(product.product_id))?;
        item.name = product.name;
        item.price = product.price;
        item.image_url = product.image_url;
        item.stock_quantity = product.stock_quantity;
        if !item.can_increase() {
            return Err(CartError::OutOfStock {
                name: item.name.clone(),
                available: item.stock_quantity,
            });
        }
        item.quantity += 1;
        Ok(())
    }

    /// Remove one unit; the line disappears when its last unit goes.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] for an unknown product.
    pub fn decrease(&mut self, product_id: ProductId) -> Result<(), CartError> {
        let item = self
            .find_mut(product_id)
            .ok_or(CartError::NotInCart(product_id))?;
        if item.quantity <= 1 {
            self.remove(product_id);
        } else {
            item.quantity -= 1;
        }
        Ok(())
    }

    /// Drop a line entirely. Unknown products are ignored.
    pub fn remove(&mut self, product_id: ProductId) {
        self.items.retain(|item| item.product_id != product_id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Quantity of a product, 0 when absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| item.product_id == product_id)
            .map_or(0, |item| item.quantity)
    }

    /// Units across all lines (the badge count).
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    fn find_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }
}
