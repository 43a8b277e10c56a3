// Entities making up a trxcon instance
#[derive(PartialEq, Eq, Hash, Clone, Debug, Copy)]
pub enum TrxconEntity {
    /// TDMA scheduler, owns timeslots and logical channels
    L1Sched,
    /// Link to the transceiver (CLCK, CTRL and DATA sockets)
    TrxLink,
    /// Boundary towards the L2/L3 stack
    L1ctl,
}

/// Service access points between the entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sap {
    /// Burst data between scheduler and transceiver link
    TrxdSap,
    /// Transceiver control commands, link events and clock indications
    TrxcSap,
    /// Between scheduler and the L1CTL boundary
    L1ctlSap,
}
