//! Static binding between the remote's report column names and the local
//! SQLite schema. The report API is asked for exactly these columns, in
//! this order; every SQL statement over the measurement fields is derived
//! from this one table.

/// (remote report column, local SQLite column), in wire order.
pub const MEASUREMENT_COLUMNS: [(&str, &str); 28] = [
    ("auxHeat1", "aux_heat1"),
    ("auxHeat2", "aux_heat2"),
    ("auxHeat3", "aux_heat3"),
    ("compCool1", "comp_cool1"),
    ("compCool2", "comp_cool2"),
    ("compHeat1", "comp_heat1"),
    ("compHeat2", "comp_heat2"),
    ("dehumidifier", "dehumidifier"),
    ("dmOffset", "dm_offset"),
    ("economizer", "economizer"),
    ("fan", "fan"),
    ("humidifier", "humidifier"),
    ("hvacMode", "hvac_mode"),
    ("outdoorHumidity", "outdoor_humidity"),
    ("outdoorTemp", "outdoor_temp"),
    ("sky", "sky"),
    ("ventilator", "ventilator"),
    ("wind", "wind"),
    ("zoneAveTemp", "zone_ave_temp"),
    ("zoneCalendarEvent", "zone_calendar_event"),
    ("zoneClimate", "zone_climate"),
    ("zoneCoolTemp", "zone_cool_temp"),
    ("zoneHeatTemp", "zone_heat_temp"),
    ("zoneHumidity", "zone_humidity"),
    ("zoneHumidityHigh", "zone_humidity_high"),
    ("zoneHumidityLow", "zone_humidity_low"),
    ("zoneHvacMode", "zone_hvac_mode"),
    ("zoneOccupancy", "zone_occupancy"),
];

/// Comma-joined remote column list for the report request.
pub fn report_column_list() -> String {
    MEASUREMENT_COLUMNS
        .iter()
        .map(|(api, _)| *api)
        .collect::<Vec<_>>()
        .join(",")
}

/// Local measurement column names, in wire order.
pub fn db_columns() -> impl Iterator<Item = &'static str> {
    MEASUREMENT_COLUMNS.iter().map(|(_, db)| *db)
}
