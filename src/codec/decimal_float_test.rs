use crate::codec::DecimalFloat;

#[test]
fn test_normalise() {
    assert_eq!(DecimalFloat::new(12, 1), DecimalFloat::new(1200, 3).normalise());
    assert_eq!(DecimalFloat::new(5, 0), DecimalFloat::new(5, 0).normalise());
    assert_eq!(DecimalFloat::new(0, 0), DecimalFloat::new(0, 7).normalise());
    assert_eq!(DecimalFloat::new(-30, 1), DecimalFloat::new(-300, 2).normalise());
    assert_eq!(
        DecimalFloat::new(120, 0),
        DecimalFloat::new(120, 0).normalise()
    );
}

#[test]
fn test_display() {
    assert_eq!("123.45", DecimalFloat::new(12345, 2).to_string());
    assert_eq!("0.12", DecimalFloat::new(12, 2).to_string());
    assert_eq!("-0.012", DecimalFloat::new(-12, 3).to_string());
    assert_eq!("42", DecimalFloat::new(42, 0).to_string());
    assert_eq!("0", DecimalFloat::ZERO.to_string());
}
