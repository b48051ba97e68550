use log::info;

use crate::{
    bounded, DatabaseError, GiftData, GiftTier, HalaContext, StoreCategory, StoreItemData,
};

/// Read access to the gift and store item catalogs, seeded with a default
/// lineup on an empty store.
pub struct Catalog {
    context: HalaContext,
}

impl Catalog {
    pub fn new(context: &HalaContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Every sendable gift, cheapest first
    pub async fn gifts(&self) -> Result<Vec<GiftData>, DatabaseError> {
        let mut gifts = bounded(self.context.database.list_gifts()).await?;
        gifts.sort_by_key(|g| g.price);

        Ok(gifts)
    }

    pub async fn gift_by_id(&self, gift_id: &str) -> Result<GiftData, DatabaseError> {
        bounded(self.context.database.gift_by_id(gift_id)).await
    }

    pub async fn store_items(&self) -> Result<Vec<StoreItemData>, DatabaseError> {
        let mut items = bounded(self.context.database.list_store_items()).await?;
        items.sort_by_key(|i| i.price);

        Ok(items)
    }

    pub async fn store_item_by_id(&self, item_id: &str) -> Result<StoreItemData, DatabaseError> {
        bounded(self.context.database.store_item_by_id(item_id)).await
    }

    /// Inserts the default lineup when the catalog is empty. Safe to call on
    /// every boot.
    pub async fn seed_defaults(&self) -> Result<(), DatabaseError> {
        if bounded(self.context.database.list_gifts()).await?.is_empty() {
            for gift in default_gifts() {
                bounded(self.context.database.create_gift(gift)).await?;
            }

            info!("Seeded the default gift lineup");
        }

        if bounded(self.context.database.list_store_items())
            .await?
            .is_empty()
        {
            for item in default_store_items() {
                bounded(self.context.database.create_store_item(item)).await?;
            }

            info!("Seeded the default store items");
        }

        Ok(())
    }
}

fn default_gifts() -> Vec<GiftData> {
    let gift = |id: &str, name: &str, price: i64, icon: &str, tier| GiftData {
        id: id.to_string(),
        name: name.to_string(),
        price,
        icon: icon.to_string(),
        tier,
    };

    vec![
        gift("rose", "Rose", 1, "🌹", GiftTier::Basic),
        gift("heart", "Heart", 10, "💖", GiftTier::Epic),
        gift("crown", "Crown", 100, "👑", GiftTier::Epic),
        gift("sports-car", "Sports Car", 500, "🏎️", GiftTier::Legendary),
        gift("rocket", "Rocket", 1000, "🚀", GiftTier::Legendary),
        gift("dragon", "Dragon", 5000, "🐉", GiftTier::Legendary),
    ]
}

fn default_store_items() -> Vec<StoreItemData> {
    let item = |id: &str,
                name: &str,
                category,
                price: i64,
                icon: &str,
                description: &str,
                duration_days| StoreItemData {
        id: id.to_string(),
        name: name.to_string(),
        category,
        price,
        icon: icon.to_string(),
        description: Some(description.to_string()),
        duration_days,
    };

    vec![
        item(
            "frame-gold",
            "Golden Frame",
            StoreCategory::Frame,
            500,
            "🖼️",
            "A golden border around your avatar",
            Some(30),
        ),
        item(
            "frame-neon",
            "Neon Frame",
            StoreCategory::Frame,
            300,
            "💠",
            "A glowing neon border around your avatar",
            Some(30),
        ),
        item(
            "entry-comet",
            "Comet Entry",
            StoreCategory::Entry,
            800,
            "☄️",
            "Arrive in rooms trailing a comet",
            Some(30),
        ),
        item(
            "entry-phoenix",
            "Phoenix Entry",
            StoreCategory::Entry,
            1200,
            "🔥",
            "Arrive in rooms on phoenix wings",
            Some(30),
        ),
        item(
            "audio-chime",
            "Crystal Chime",
            StoreCategory::Audio,
            200,
            "🔔",
            "A crystal chime plays when you take a seat",
            None,
        ),
        item(
            "audio-drums",
            "Drum Roll",
            StoreCategory::Audio,
            250,
            "🥁",
            "A drum roll plays when you take a seat",
            None,
        ),
    ]
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{EventBus, MemoryDatabase};

    fn catalog() -> Catalog {
        Catalog::new(&HalaContext {
            database: Arc::new(MemoryDatabase::default()),
            events: EventBus::default(),
            rooms: Default::default(),
        })
    }

    #[tokio::test]
    async fn seeding_twice_does_not_duplicate() {
        let catalog = catalog();

        catalog.seed_defaults().await.unwrap();
        let first = catalog.gifts().await.unwrap().len();

        catalog.seed_defaults().await.unwrap();
        let second = catalog.gifts().await.unwrap().len();

        assert!(first > 0);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn gifts_are_sorted_by_price() {
        let catalog = catalog();
        catalog.seed_defaults().await.unwrap();

        let gifts = catalog.gifts().await.unwrap();
        let prices: Vec<_> = gifts.iter().map(|g| g.price).collect();

        let mut sorted = prices.clone();
        sorted.sort();

        assert_eq!(prices, sorted);
    }
}
