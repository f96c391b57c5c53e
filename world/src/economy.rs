//! Currency counter credited by kills and debited by upgrades.

/// Player treasury.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Treasury {
    balance: u32,
}

impl Treasury {
    pub(crate) const fn new(balance: u32) -> Self {
        Self { balance }
    }

    pub(crate) const fn balance(&self) -> u32 {
        self.balance
    }

    pub(crate) fn credit(&mut self, amount: u32) {
        self.balance = self.balance.saturating_add(amount);
    }

    /// Debits `cost` if the balance covers it.
    pub(crate) fn spend(&mut self, cost: u32) -> bool {
        match self.balance.checked_sub(cost) {
            Some(balance) => {
                self.balance = balance;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Treasury;

    #[test]
    fn spending_more_than_the_balance_is_refused() {
        let mut treasury = Treasury::new(30);
        assert!(!treasury.spend(31));
        assert_eq!(treasury.balance(), 30);
        assert!(treasury.spend(30));
        assert_eq!(treasury.balance(), 0);
    }

    #[test]
    fn credit_saturates() {
        let mut treasury = Treasury::new(u32::MAX - 1);
        treasury.credit(10);
        assert_eq!(treasury.balance(), u32::MAX);
    }
}
